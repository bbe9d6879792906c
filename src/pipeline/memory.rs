use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Datelike, Utc};

use super::domain::{
    Enrollment, EnrollmentLink, EnrollmentNumber, EnrollmentStatus, HistoryEntry, Lead,
    LeadId, LeadStatus, LedgerEntry, LedgerEntryId, LedgerEntryKind, LinkToken,
    PaymentMethod, PaymentMethodId, UserId,
};
use super::settlement::ConversionDraft;
use super::store::{ConversionRecord, PipelineStore, StoreError};

/// In-memory store used by the server, the demo command, and tests.
///
/// A single mutex guards all tables, so every trait method observes and
/// mutates a consistent snapshot; compound commits are atomic by
/// construction and concurrent callers serialize on the lock.
#[derive(Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    leads: HashMap<LeadId, Lead>,
    payment_methods: HashMap<PaymentMethodId, PaymentMethod>,
    enrollments: HashMap<LeadId, Enrollment>,
    ledger: Vec<LedgerEntry>,
    links: HashMap<LeadId, EnrollmentLink>,
    history: Vec<HistoryEntry>,
    // Monotonic enrollment sequence per calendar year; never derived from a
    // row count.
    sequences: BTreeMap<i32, u32>,
    next_ledger_id: u64,
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking holder poisons the mutex but the tables it guards are
        // only mutated after validation, so recover the guard and keep
        // serving rather than take the process down.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Inner {
    fn has_lead_payment(&self, lead_id: &LeadId) -> bool {
        self.ledger.iter().any(|entry| {
            entry.kind == LedgerEntryKind::LeadPayment
                && entry.lead_id.as_ref() == Some(lead_id)
        })
    }
}

impl PipelineStore for MemoryStore {
    fn insert_lead(&self, lead: Lead, entry: HistoryEntry) -> Result<Lead, StoreError> {
        let mut inner = self.lock();
        if inner.leads.contains_key(&lead.id) {
            return Err(StoreError::Conflict);
        }
        inner.leads.insert(lead.id.clone(), lead.clone());
        inner.history.push(entry);
        Ok(lead)
    }

    fn fetch_lead(&self, id: &LeadId) -> Result<Option<Lead>, StoreError> {
        Ok(self.lock().leads.get(id).cloned())
    }

    fn upsert_payment_method(&self, method: PaymentMethod) -> Result<(), StoreError> {
        self.lock()
            .payment_methods
            .insert(method.id.clone(), method);
        Ok(())
    }

    fn fetch_payment_method(
        &self,
        id: &PaymentMethodId,
    ) -> Result<Option<PaymentMethod>, StoreError> {
        Ok(self.lock().payment_methods.get(id).cloned())
    }

    fn commit_lead_change(&self, lead: Lead, entry: HistoryEntry) -> Result<Lead, StoreError> {
        let mut inner = self.lock();
        let stored = inner.leads.get(&lead.id).ok_or(StoreError::NotFound)?;
        if stored.version != lead.version {
            return Err(StoreError::VersionMismatch);
        }

        let mut next = lead;
        next.version += 1;
        inner.leads.insert(next.id.clone(), next.clone());
        inner.history.push(entry);
        Ok(next)
    }

    fn commit_conversion(
        &self,
        draft: ConversionDraft,
        entry: HistoryEntry,
    ) -> Result<ConversionRecord, StoreError> {
        let mut inner = self.lock();

        let stored = inner
            .leads
            .get(&draft.lead_id)
            .ok_or(StoreError::NotFound)?;
        if stored.version != draft.expected_version {
            return Err(StoreError::VersionMismatch);
        }
        // Uniqueness guards: losing racer fails here instead of creating a
        // duplicate enrollment or ledger entry.
        if stored.status == LeadStatus::Converted
            || inner.enrollments.contains_key(&draft.lead_id)
            || inner.has_lead_payment(&draft.lead_id)
        {
            return Err(StoreError::Conflict);
        }

        let year = draft.converted_at.year();
        let sequence = {
            let counter = inner.sequences.entry(year).or_insert(0);
            *counter += 1;
            *counter
        };
        let number = EnrollmentNumber { year, sequence };

        let enrollment = Enrollment {
            lead_id: draft.lead_id.clone(),
            number,
            modality: draft.modality,
            status: EnrollmentStatus::Active,
            start_date: draft.start_date,
            created_at: draft.converted_at,
        };

        inner.next_ledger_id += 1;
        let ledger_entry = LedgerEntry {
            id: LedgerEntryId(inner.next_ledger_id),
            kind: LedgerEntryKind::LeadPayment,
            description: draft.description.clone(),
            amount: draft.fees.amount,
            fee_amount: draft.fees.fee_amount,
            net_amount: draft.fees.net_amount,
            lead_id: Some(draft.lead_id.clone()),
            payment_method_id: Some(draft.payment_method_id.clone()),
            recorded_at: draft.converted_at,
        };

        let mut lead = inner
            .leads
            .get(&draft.lead_id)
            .cloned()
            .ok_or(StoreError::NotFound)?;
        lead.status = LeadStatus::Converted;
        lead.converted_at = Some(draft.converted_at);
        lead.payment_method_id = Some(draft.payment_method_id);
        lead.installments = Some(draft.installments);
        lead.version += 1;

        inner.leads.insert(lead.id.clone(), lead.clone());
        inner
            .enrollments
            .insert(draft.lead_id.clone(), enrollment.clone());
        inner.ledger.push(ledger_entry.clone());
        inner.history.push(entry);

        Ok(ConversionRecord {
            lead,
            enrollment,
            ledger_entry,
        })
    }

    fn live_link(
        &self,
        lead_id: &LeadId,
        now: DateTime<Utc>,
    ) -> Result<Option<EnrollmentLink>, StoreError> {
        Ok(self
            .lock()
            .links
            .get(lead_id)
            .filter(|link| link.is_live(now))
            .cloned())
    }

    fn upsert_link(
        &self,
        link: EnrollmentLink,
        entry: HistoryEntry,
    ) -> Result<EnrollmentLink, StoreError> {
        let mut inner = self.lock();
        if !inner.leads.contains_key(&link.lead_id) {
            return Err(StoreError::NotFound);
        }
        inner.links.insert(link.lead_id.clone(), link.clone());
        inner.history.push(entry);
        Ok(link)
    }

    fn consume_link(
        &self,
        token: &LinkToken,
        now: DateTime<Utc>,
        actor_id: UserId,
    ) -> Result<EnrollmentLink, StoreError> {
        let mut inner = self.lock();
        let lead_id = inner
            .links
            .values()
            .find(|link| &link.token == token)
            .map(|link| link.lead_id.clone())
            .ok_or(StoreError::NotFound)?;

        let link = inner
            .links
            .get_mut(&lead_id)
            .ok_or(StoreError::NotFound)?;
        if link.used {
            return Err(StoreError::Conflict);
        }
        if link.is_expired(now) {
            return Err(StoreError::Expired);
        }

        link.used = true;
        link.used_at = Some(now);
        let consumed = link.clone();

        inner.history.push(HistoryEntry {
            lead_id,
            action: "enrollment link consumed".to_string(),
            from: None,
            to: None,
            actor_id,
            recorded_at: now,
        });

        Ok(consumed)
    }

    fn append_history(&self, entry: HistoryEntry) -> Result<(), StoreError> {
        let mut inner = self.lock();
        if !inner.leads.contains_key(&entry.lead_id) {
            return Err(StoreError::NotFound);
        }
        inner.history.push(entry);
        Ok(())
    }

    fn history_for(&self, lead_id: &LeadId) -> Result<Vec<HistoryEntry>, StoreError> {
        Ok(self
            .lock()
            .history
            .iter()
            .filter(|entry| &entry.lead_id == lead_id)
            .cloned()
            .collect())
    }

    fn enrollment_for(&self, lead_id: &LeadId) -> Result<Option<Enrollment>, StoreError> {
        Ok(self.lock().enrollments.get(lead_id).cloned())
    }

    fn ledger_for(&self, lead_id: &LeadId) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self
            .lock()
            .ledger
            .iter()
            .filter(|entry| entry.lead_id.as_ref() == Some(lead_id))
            .cloned()
            .collect())
    }
}
