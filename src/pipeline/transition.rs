use super::domain::LeadStatus;

/// How a validated status change should be carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPlan {
    /// Forward funnel move, skips allowed.
    Advance,
    /// Delegate to the loss handler.
    Loss,
    /// Unconstrained write permitted for privileged roles only.
    ManualCorrection,
}

/// Rejection raised while validating a status change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("lead is already converted")]
    AlreadyConverted,
    #[error("lead is already at {0}")]
    AlreadyAt(LeadStatus),
    #[error("cannot move from {from} back to {to} without a manual correction")]
    BackwardMove { from: LeadStatus, to: LeadStatus },
    #[error("conversion requires a payment method and installment count")]
    PaymentDataRequired,
    #[error("marking a lead lost requires a non-empty reason")]
    MissingLossReason,
}

/// Validate a requested status change against the funnel rules.
///
/// `can_override` reflects the access policy's manual-correction gate; when
/// set, backward moves and reopening a lost lead become legal unconstrained
/// writes.
pub fn plan(
    current: LeadStatus,
    target: LeadStatus,
    can_override: bool,
) -> Result<TransitionPlan, TransitionError> {
    if current == LeadStatus::Converted {
        return Err(TransitionError::AlreadyConverted);
    }

    // A bare flip to converted carries no payment data; the settlement
    // processor owns that transition.
    if target == LeadStatus::Converted {
        return Err(TransitionError::PaymentDataRequired);
    }

    if target == LeadStatus::Lost {
        return Ok(TransitionPlan::Loss);
    }

    if current == LeadStatus::Lost {
        return if can_override {
            Ok(TransitionPlan::ManualCorrection)
        } else {
            Err(TransitionError::BackwardMove {
                from: current,
                to: target,
            })
        };
    }

    if current == target {
        return Err(TransitionError::AlreadyAt(current));
    }

    let from = current
        .funnel_position()
        .unwrap_or_else(|| unreachable!("non-terminal status is always in the funnel"));
    let to = target
        .funnel_position()
        .unwrap_or_else(|| unreachable!("non-terminal status is always in the funnel"));

    if to > from {
        Ok(TransitionPlan::Advance)
    } else if can_override {
        Ok(TransitionPlan::ManualCorrection)
    } else {
        Err(TransitionError::BackwardMove {
            from: current,
            to: target,
        })
    }
}
