use chrono::{DateTime, Utc};

use super::domain::{Lead, LeadStatus};
use super::transition::TransitionError;

/// Ordered funnel prefix up to and including the stage a lead occupied when
/// it was marked lost. This preserves where in the funnel the lead died,
/// independent of which statuses it actually visited.
pub fn stages_before_loss(at: LeadStatus) -> Vec<LeadStatus> {
    match at.funnel_position() {
        Some(position) => LeadStatus::FUNNEL[..=position].to_vec(),
        None => Vec::new(),
    }
}

/// Apply a loss to the lead, returning the updated record.
///
/// Re-marking an already-lost lead overwrites the reason (last-write-wins)
/// and restamps `lost_at`, while `stages_before_loss` keeps the prefix
/// captured at the first loss.
pub fn mark_lost(
    mut lead: Lead,
    reason: &str,
    now: DateTime<Utc>,
) -> Result<Lead, TransitionError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(TransitionError::MissingLossReason);
    }

    if lead.status != LeadStatus::Lost {
        lead.stages_before_loss = stages_before_loss(lead.status);
    }
    lead.status = LeadStatus::Lost;
    lead.lost_at = Some(now);
    lead.loss_reason = Some(reason.to_string());

    Ok(lead)
}
