use chrono::{DateTime, Utc};

use super::domain::{
    Enrollment, EnrollmentLink, HistoryEntry, Lead, LeadId, LedgerEntry, LinkToken,
    PaymentMethod, PaymentMethodId, UserId,
};
use super::settlement::ConversionDraft;

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("write conflicts with a committed record")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("stale lead version")]
    VersionMismatch,
    #[error("enrollment link expired")]
    Expired,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Records produced by a committed conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRecord {
    pub lead: Lead,
    pub enrollment: Enrollment,
    pub ledger_entry: LedgerEntry,
}

/// Storage seam for the pipeline. Every mutating method is a single unit of
/// work: the state change and its audit entry commit together or not at all,
/// and uniqueness guards are enforced inside the same unit.
///
/// Lead writes are optimistic: the submitted record carries the version it
/// was read at, and the store rejects stale writers with `VersionMismatch`.
pub trait PipelineStore: Send + Sync {
    /// Insert a brand-new lead together with its intake audit entry.
    fn insert_lead(&self, lead: Lead, entry: HistoryEntry) -> Result<Lead, StoreError>;

    fn fetch_lead(&self, id: &LeadId) -> Result<Option<Lead>, StoreError>;

    fn upsert_payment_method(&self, method: PaymentMethod) -> Result<(), StoreError>;

    fn fetch_payment_method(
        &self,
        id: &PaymentMethodId,
    ) -> Result<Option<PaymentMethod>, StoreError>;

    /// Commit a mutated lead (status change, loss, price edit) with its audit
    /// entry, enforcing the optimistic version check.
    fn commit_lead_change(&self, lead: Lead, entry: HistoryEntry) -> Result<Lead, StoreError>;

    /// Apply the four conversion effects atomically: mark the lead converted,
    /// allocate the next enrollment number for the year, create the ledger
    /// entry, and append the audit entry. Fails with `Conflict` when the lead
    /// already has an enrollment or a lead-payment ledger entry.
    fn commit_conversion(
        &self,
        draft: ConversionDraft,
        entry: HistoryEntry,
    ) -> Result<ConversionRecord, StoreError>;

    /// The lead's unused, unexpired link, when one exists.
    fn live_link(
        &self,
        lead_id: &LeadId,
        now: DateTime<Utc>,
    ) -> Result<Option<EnrollmentLink>, StoreError>;

    /// Replace the lead's link record, keyed by lead id, with its audit
    /// entry. Concurrent issuance converges on a single live link.
    fn upsert_link(
        &self,
        link: EnrollmentLink,
        entry: HistoryEntry,
    ) -> Result<EnrollmentLink, StoreError>;

    /// Atomically check unused-and-unexpired, then mark the link consumed and
    /// append the audit entry. A second attempt fails with `Conflict`.
    fn consume_link(
        &self,
        token: &LinkToken,
        now: DateTime<Utc>,
        actor_id: UserId,
    ) -> Result<EnrollmentLink, StoreError>;

    /// Append a standalone audit entry (notes).
    fn append_history(&self, entry: HistoryEntry) -> Result<(), StoreError>;

    fn history_for(&self, lead_id: &LeadId) -> Result<Vec<HistoryEntry>, StoreError>;

    fn enrollment_for(&self, lead_id: &LeadId) -> Result<Option<Enrollment>, StoreError>;

    fn ledger_for(&self, lead_id: &LeadId) -> Result<Vec<LedgerEntry>, StoreError>;
}
