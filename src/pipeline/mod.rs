//! Lead pipeline and settlement engine.
//!
//! Leads move through a fixed sales funnel, branch into loss or conversion,
//! and every mutation is committed together with its audit entry. Conversion
//! settles money-relevant state (enrollment, ledger entry, fee split) as a
//! single unit of work behind the [`store::PipelineStore`] seam.

pub(crate) mod access;
pub mod domain;
pub mod link;
pub(crate) mod loss;
pub mod memory;
pub mod policy;
pub mod router;
pub mod service;
pub mod settlement;
pub mod store;
pub(crate) mod transition;

#[cfg(test)]
mod tests;

pub use access::{AccessPolicy, PipelineAction};
pub use domain::{
    Actor, Enrollment, EnrollmentLink, EnrollmentModality, EnrollmentNumber,
    EnrollmentStatus, HistoryEntry, Lead, LeadId, LeadStatus, LedgerEntry, LedgerEntryId,
    LedgerEntryKind, LinkToken, Money, NewLead, PaymentMethod, PaymentMethodId, Role,
    SellerId, UserId,
};
pub use memory::MemoryStore;
pub use policy::{
    LimitBound, LimitCatalogue, LimitDecision, LimitViolation, SellerLimits, ValueBounds,
};
pub use router::pipeline_router;
pub use service::{
    ConversionNotice, ConversionNotifier, NoopNotifier, NotifyError, PipelineConfig,
    PipelineError, PipelineService,
};
pub use settlement::{ConversionDraft, FeeBreakdown, SettlementError};
pub use store::{ConversionRecord, PipelineStore, StoreError};
pub use transition::{TransitionError, TransitionPlan};
