use std::fmt;
use std::ops::{Add, Sub};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for leads tracked through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeadId(pub String);

/// Identifier wrapper for salespeople.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SellerId(pub String);

/// Identifier wrapper for acting users recorded in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    /// Sentinel actor for operations triggered without an authenticated user,
    /// such as enrollment-link consumption.
    pub fn system() -> Self {
        UserId("system".to_string())
    }
}

/// Identifier wrapper for configured payment methods.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentMethodId(pub String);

/// Opaque single-use token backing an enrollment link.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkToken(pub String);

/// Currency amount held as integer cents so fee arithmetic stays exact.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub const fn cents(self) -> i64 {
        self.0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let cents = self.0.abs();
        write!(f, "{}{}.{:02}", sign, cents / 100, cents % 100)
    }
}

/// Pipeline stage a lead currently occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LeadStatus {
    Pending,
    Contacted,
    Negociating,
    ConfirmPayment,
    Converted,
    Lost,
}

impl LeadStatus {
    /// Ordered funnel stages a lead moves through before a terminal outcome.
    pub const FUNNEL: [LeadStatus; 4] = [
        LeadStatus::Pending,
        LeadStatus::Contacted,
        LeadStatus::Negociating,
        LeadStatus::ConfirmPayment,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            LeadStatus::Pending => "pending",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Negociating => "negociating",
            LeadStatus::ConfirmPayment => "confirmPayment",
            LeadStatus::Converted => "converted",
            LeadStatus::Lost => "lost",
        }
    }

    /// Position within the funnel, `None` for the terminal outcomes.
    pub fn funnel_position(self) -> Option<usize> {
        Self::FUNNEL.iter().position(|stage| *stage == self)
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Role carried by an acting user; consumed, never managed, by this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Seller,
    Admin,
    Director,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Seller => "seller",
            Role::Admin => "admin",
            Role::Director => "director",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Acting user attached to every mutating operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

/// Intake payload for a new prospect, before the pipeline assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLead {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub seller_id: Option<SellerId>,
    pub course: Option<String>,
    pub category: Option<String>,
    pub quoted_price: Option<Money>,
}

/// A sales prospect tracked through the pipeline.
///
/// `version` is an optimistic concurrency counter bumped on every committed
/// write; stale writers lose with a version mismatch instead of clobbering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub seller_id: Option<SellerId>,
    pub course: Option<String>,
    pub category: Option<String>,
    pub quoted_price: Option<Money>,
    pub status: LeadStatus,
    pub created_at: DateTime<Utc>,
    pub converted_at: Option<DateTime<Utc>>,
    pub lost_at: Option<DateTime<Utc>>,
    pub loss_reason: Option<String>,
    pub stages_before_loss: Vec<LeadStatus>,
    pub payment_method_id: Option<PaymentMethodId>,
    pub installments: Option<u8>,
    pub version: u64,
}

impl Lead {
    pub fn from_intake(id: LeadId, intake: NewLead, now: DateTime<Utc>) -> Self {
        Lead {
            id,
            name: intake.name,
            email: intake.email,
            phone: intake.phone,
            seller_id: intake.seller_id,
            course: intake.course,
            category: intake.category,
            quoted_price: intake.quoted_price,
            status: LeadStatus::Pending,
            created_at: now,
            converted_at: None,
            lost_at: None,
            loss_reason: None,
            stages_before_loss: Vec::new(),
            payment_method_id: None,
            installments: None,
            version: 0,
        }
    }
}

/// Payable option configured by finance; read-only input to fee computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub name: String,
    pub fee_percentage: f64,
    pub max_installments: u8,
    pub active: bool,
    pub visible: bool,
}

/// Human-readable sequential enrollment number, rendered as `UC-YYYY-NNNN`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EnrollmentNumber {
    pub year: i32,
    pub sequence: u32,
}

impl fmt::Display for EnrollmentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UC-{}-{:04}", self.year, self.sequence)
    }
}

/// Delivery modality recorded on a new enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnrollmentModality {
    Online,
    InPerson,
    Hybrid,
}

/// Lifecycle status of an enrollment; only `Active` is written here, the rest
/// belong to external collaborators (certificate issuance, cancellation).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnrollmentStatus {
    Active,
    Cancelled,
    Completed,
}

/// The record of a completed course registration, created exactly once per
/// converted lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub lead_id: LeadId,
    pub number: EnrollmentNumber,
    pub modality: EnrollmentModality,
    pub status: EnrollmentStatus,
    pub start_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Identifier for ledger rows, allocated by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerEntryId(pub u64);

/// Classification of a financial record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LedgerEntryKind {
    In,
    Out,
    LeadPayment,
}

impl LedgerEntryKind {
    pub const fn label(self) -> &'static str {
        match self {
            LedgerEntryKind::In => "in",
            LedgerEntryKind::Out => "out",
            LedgerEntryKind::LeadPayment => "leadPayment",
        }
    }
}

/// Money-relevant record; for `LeadPayment` rows the gross amount always
/// equals fee plus net.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub kind: LedgerEntryKind,
    pub description: String,
    pub amount: Money,
    pub fee_amount: Money,
    pub net_amount: Money,
    pub lead_id: Option<LeadId>,
    pub payment_method_id: Option<PaymentMethodId>,
    pub recorded_at: DateTime<Utc>,
}

/// One-time token granting unauthenticated completion of enrollment for a
/// specific lead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentLink {
    pub token: LinkToken,
    pub lead_id: LeadId,
    pub seller_id: SellerId,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub used_at: Option<DateTime<Utc>>,
}

impl EnrollmentLink {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Unused and not yet expired, so still honorable by a consumer.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.used && !self.is_expired(now)
    }

    pub fn path(&self) -> String {
        format!("/matricular/{}", self.token.0)
    }
}

/// Append-only audit row; one per meaningful transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub lead_id: LeadId,
    pub action: String,
    pub from: Option<LeadStatus>,
    pub to: Option<LeadStatus>,
    pub actor_id: UserId,
    pub recorded_at: DateTime<Utc>,
}
