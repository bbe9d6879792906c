use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use super::access::{AccessPolicy, PipelineAction};
use super::domain::{
    Actor, EnrollmentLink, EnrollmentNumber, HistoryEntry, Lead, LeadId, LeadStatus,
    LinkToken, Money, NewLead, PaymentMethodId, Role, SellerId, UserId,
};
use super::link;
use super::loss;
use super::policy::{LimitCatalogue, LimitDecision, LimitViolation};
use super::settlement::{self, SettlementError};
use super::store::{ConversionRecord, PipelineStore, StoreError};
use super::transition::{self, TransitionError, TransitionPlan};

/// Error raised by the pipeline service, one variant per taxonomy entry.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Settlement(#[from] SettlementError),
    #[error(transparent)]
    Limit(#[from] LimitViolation),
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("lost a concurrent update race; refresh and retry")]
    Concurrency,
    #[error("role {role} may not {action}")]
    Denied {
        role: Role,
        action: PipelineAction,
    },
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => PipelineError::NotFound("record"),
            StoreError::Conflict => {
                PipelineError::Conflict("write conflicts with a committed record".to_string())
            }
            StoreError::VersionMismatch => PipelineError::Concurrency,
            StoreError::Expired => {
                PipelineError::Conflict("enrollment link expired".to_string())
            }
            StoreError::Unavailable(_) => PipelineError::Store(err),
        }
    }
}

/// Post-commit notification describing a settled conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionNotice {
    pub lead_id: LeadId,
    pub enrollment_number: EnrollmentNumber,
    pub amount: Money,
    pub payment_method: String,
    pub installments: u8,
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Outbound seam observed by external collaborators once a conversion has
/// committed; implementations see the post-conversion lead state.
pub trait ConversionNotifier: Send + Sync {
    fn publish(&self, notice: ConversionNotice) -> Result<(), NotifyError>;
}

/// Notifier used when no downstream channel is wired.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl ConversionNotifier for NoopNotifier {
    fn publish(&self, _notice: ConversionNotice) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Tunable pipeline dials.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineConfig {
    /// Committed amount when a lead was never quoted a price.
    pub default_amount: Money,
    /// Days before an issued enrollment link expires.
    pub link_ttl_days: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            default_amount: Money::from_cents(49_990),
            link_ttl_days: 7,
        }
    }
}

static LEAD_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_lead_id() -> LeadId {
    let id = LEAD_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    LeadId(format!("lead-{id:06}"))
}

/// Service composing the transition rules, loss handler, settlement
/// processor, link issuer, value-limit policy, and audit logging over a
/// pluggable store.
pub struct PipelineService<S, N> {
    store: Arc<S>,
    notifier: Arc<N>,
    access: AccessPolicy,
    limits: LimitCatalogue,
    config: PipelineConfig,
}

impl<S, N> PipelineService<S, N>
where
    S: PipelineStore + 'static,
    N: ConversionNotifier + 'static,
{
    pub fn new(
        store: Arc<S>,
        notifier: Arc<N>,
        limits: LimitCatalogue,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            access: AccessPolicy,
            limits,
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn authorize(&self, actor: &Actor, action: PipelineAction) -> Result<(), PipelineError> {
        if self.access.allows(actor.role, action) {
            Ok(())
        } else {
            Err(PipelineError::Denied {
                role: actor.role,
                action,
            })
        }
    }

    /// Register a prospect from intake or manual entry.
    pub fn create_lead(&self, intake: NewLead, actor: &Actor) -> Result<Lead, PipelineError> {
        self.authorize(actor, PipelineAction::CreateLead)?;

        if intake.name.trim().is_empty() {
            return Err(PipelineError::Validation("lead name is required".to_string()));
        }
        if let Some(price) = intake.quoted_price {
            if !price.is_positive() {
                return Err(PipelineError::Validation(
                    "quoted price must be positive".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let lead = Lead::from_intake(next_lead_id(), intake, now);
        let entry = HistoryEntry {
            lead_id: lead.id.clone(),
            action: "lead created".to_string(),
            from: None,
            to: Some(LeadStatus::Pending),
            actor_id: actor.id.clone(),
            recorded_at: now,
        };

        let stored = self.store.insert_lead(lead, entry)?;
        info!(lead = %stored.id.0, "lead registered");
        Ok(stored)
    }

    /// Move a lead through the pipeline, branching into the loss handler for
    /// `lost` targets. Conversion is rejected here; it carries payment data
    /// and goes through [`PipelineService::convert`].
    pub fn change_status(
        &self,
        lead_id: &LeadId,
        target: LeadStatus,
        actor: &Actor,
        loss_reason: Option<&str>,
    ) -> Result<Lead, PipelineError> {
        let lead = self
            .store
            .fetch_lead(lead_id)?
            .ok_or(PipelineError::NotFound("lead"))?;
        let current = lead.status;

        let can_override = self
            .access
            .allows(actor.role, PipelineAction::ManualStatusCorrection);
        let plan = transition::plan(current, target, can_override)?;

        let now = Utc::now();
        let (updated, action) = match plan {
            TransitionPlan::Loss => {
                self.authorize(actor, PipelineAction::MarkLost)?;
                let reason = loss_reason.unwrap_or_default();
                let updated = loss::mark_lost(lead, reason, now)?;
                let action = format!("lead marked lost: {}", reason.trim());
                (updated, action)
            }
            TransitionPlan::Advance => {
                self.authorize(actor, PipelineAction::AdvanceStatus)?;
                let mut updated = lead;
                updated.status = target;
                (updated, format!("status advanced from {current} to {target}"))
            }
            TransitionPlan::ManualCorrection => {
                let mut updated = lead;
                updated.status = target;
                // Corrections out of `lost` clear the loss stamp so the
                // record stays coherent.
                if current == LeadStatus::Lost && target != LeadStatus::Lost {
                    updated.lost_at = None;
                    updated.loss_reason = None;
                    updated.stages_before_loss.clear();
                }
                (
                    updated,
                    format!("manual status correction from {current} to {target}"),
                )
            }
        };

        let entry = HistoryEntry {
            lead_id: lead_id.clone(),
            action,
            from: Some(current),
            to: Some(updated.status),
            actor_id: actor.id.clone(),
            recorded_at: now,
        };

        let stored = self
            .store
            .commit_lead_change(updated, entry)
            .map_err(PipelineError::from)?;
        info!(lead = %lead_id.0, from = %current, to = %stored.status, "status changed");
        Ok(stored)
    }

    /// Turn a qualified lead into a billed enrollment: the lead update,
    /// enrollment creation, ledger entry, and audit row commit as one unit.
    pub fn convert(
        &self,
        lead_id: &LeadId,
        payment_method_id: &PaymentMethodId,
        installments: u8,
        actor: &Actor,
    ) -> Result<ConversionRecord, PipelineError> {
        self.authorize(actor, PipelineAction::Convert)?;

        let lead = self
            .store
            .fetch_lead(lead_id)?
            .ok_or(PipelineError::NotFound("lead"))?;
        if lead.status == LeadStatus::Converted {
            return Err(PipelineError::Conflict(
                "lead is already converted".to_string(),
            ));
        }

        let method = self
            .store
            .fetch_payment_method(payment_method_id)?
            .ok_or(PipelineError::NotFound("payment method"))?;

        let now = Utc::now();
        let draft =
            settlement::draft_conversion(&lead, &method, installments, self.config.default_amount, now)?;

        let entry = HistoryEntry {
            lead_id: lead_id.clone(),
            action: format!(
                "converted with {} in {} installment(s)",
                method.name, installments
            ),
            from: Some(lead.status),
            to: Some(LeadStatus::Converted),
            actor_id: actor.id.clone(),
            recorded_at: now,
        };

        let record = self
            .store
            .commit_conversion(draft, entry)
            .map_err(|err| match err {
                StoreError::Conflict => {
                    PipelineError::Conflict("lead is already converted".to_string())
                }
                other => PipelineError::from(other),
            })?;

        info!(
            lead = %lead_id.0,
            number = %record.enrollment.number,
            amount = %record.ledger_entry.amount,
            "lead converted"
        );

        let notice = ConversionNotice {
            lead_id: lead_id.clone(),
            enrollment_number: record.enrollment.number,
            amount: record.ledger_entry.amount,
            payment_method: method.name,
            installments,
        };
        // The conversion is committed; a failed dispatch must not undo it.
        if let Err(err) = self.notifier.publish(notice) {
            warn!(lead = %lead_id.0, error = %err, "conversion notification failed");
        }

        Ok(record)
    }

    /// Issue (or idempotently re-issue) the lead's single-use enrollment
    /// link. An existing live link is returned unchanged so a token already
    /// shared with the customer stays valid.
    pub fn issue_link(
        &self,
        lead_id: &LeadId,
        seller_id: SellerId,
        actor: &Actor,
    ) -> Result<EnrollmentLink, PipelineError> {
        self.authorize(actor, PipelineAction::IssueLink)?;

        let lead = self
            .store
            .fetch_lead(lead_id)?
            .ok_or(PipelineError::NotFound("lead"))?;
        if lead.status == LeadStatus::Converted {
            return Err(PipelineError::Conflict(
                "lead is already converted".to_string(),
            ));
        }

        let now = Utc::now();
        if let Some(live) = self.store.live_link(lead_id, now)? {
            return Ok(live);
        }

        let issued = link::issue(
            lead_id.clone(),
            seller_id,
            link::fresh_token(),
            now,
            self.config.link_ttl_days,
        );
        let entry = HistoryEntry {
            lead_id: lead_id.clone(),
            action: "enrollment link issued".to_string(),
            from: None,
            to: None,
            actor_id: actor.id.clone(),
            recorded_at: now,
        };

        let stored = self.store.upsert_link(issued, entry)?;
        info!(lead = %lead_id.0, expires = %stored.expires_at, "enrollment link issued");
        Ok(stored)
    }

    /// Consume a link at enrollment-completion time: atomically checks
    /// unused-and-unexpired, then marks it used. A second attempt fails.
    pub fn consume_link(&self, token: &LinkToken) -> Result<EnrollmentLink, PipelineError> {
        self.store
            .consume_link(token, Utc::now(), UserId::system())
            .map_err(|err| match err {
                StoreError::NotFound => PipelineError::NotFound("enrollment link"),
                StoreError::Conflict => {
                    PipelineError::Conflict("enrollment link already used".to_string())
                }
                other => PipelineError::from(other),
            })
    }

    /// Consult the seller's configured price window; pure, no side effects.
    pub fn check_value_limit(
        &self,
        seller_id: &SellerId,
        category: Option<&str>,
        offered: Money,
    ) -> Result<LimitDecision, PipelineError> {
        let limits = self
            .limits
            .seller(seller_id)
            .ok_or(PipelineError::NotFound("seller limits"))?;

        Ok(match limits.check(category, offered) {
            Ok(()) => LimitDecision::Accepted,
            Err(violation) => LimitDecision::Rejected(violation),
        })
    }

    /// Update the quoted price, enforcing the seller's value limits before
    /// committing money-relevant state.
    pub fn update_price(
        &self,
        lead_id: &LeadId,
        price: Money,
        actor: &Actor,
    ) -> Result<Lead, PipelineError> {
        self.authorize(actor, PipelineAction::EditPrice)?;

        if !price.is_positive() {
            return Err(PipelineError::Validation(
                "quoted price must be positive".to_string(),
            ));
        }

        let lead = self
            .store
            .fetch_lead(lead_id)?
            .ok_or(PipelineError::NotFound("lead"))?;
        if lead.status == LeadStatus::Converted {
            return Err(PipelineError::Conflict(
                "lead is already converted".to_string(),
            ));
        }

        if let Some(seller_id) = &lead.seller_id {
            if let Some(limits) = self.limits.seller(seller_id) {
                limits.check(lead.category.as_deref(), price)?;
            }
        }

        let mut updated = lead;
        updated.quoted_price = Some(price);
        let entry = HistoryEntry {
            lead_id: lead_id.clone(),
            action: format!("quoted price updated to {price}"),
            from: None,
            to: None,
            actor_id: actor.id.clone(),
            recorded_at: Utc::now(),
        };

        self.store
            .commit_lead_change(updated, entry)
            .map_err(PipelineError::from)
    }

    /// Append a free-text note to the lead's audit trail.
    pub fn append_note(
        &self,
        lead_id: &LeadId,
        text: &str,
        actor: &Actor,
    ) -> Result<(), PipelineError> {
        self.authorize(actor, PipelineAction::AppendNote)?;

        let text = text.trim();
        if text.is_empty() {
            return Err(PipelineError::Validation("note text is required".to_string()));
        }

        self.store
            .fetch_lead(lead_id)?
            .ok_or(PipelineError::NotFound("lead"))?;

        self.store.append_history(HistoryEntry {
            lead_id: lead_id.clone(),
            action: format!("note: {text}"),
            from: None,
            to: None,
            actor_id: actor.id.clone(),
            recorded_at: Utc::now(),
        })?;
        Ok(())
    }

    pub fn get_lead(&self, lead_id: &LeadId) -> Result<Lead, PipelineError> {
        self.store
            .fetch_lead(lead_id)?
            .ok_or(PipelineError::NotFound("lead"))
    }

    /// The lead's append-only audit trail, oldest first.
    pub fn history(&self, lead_id: &LeadId) -> Result<Vec<HistoryEntry>, PipelineError> {
        self.store
            .fetch_lead(lead_id)?
            .ok_or(PipelineError::NotFound("lead"))?;
        Ok(self.store.history_for(lead_id)?)
    }
}
