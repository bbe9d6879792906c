use std::fmt;

use super::domain::Role;

/// Mutating operations gated by the role policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineAction {
    CreateLead,
    AdvanceStatus,
    ManualStatusCorrection,
    MarkLost,
    Convert,
    IssueLink,
    EditPrice,
    AppendNote,
}

impl PipelineAction {
    pub const fn label(self) -> &'static str {
        match self {
            PipelineAction::CreateLead => "create a lead",
            PipelineAction::AdvanceStatus => "advance a lead",
            PipelineAction::ManualStatusCorrection => "manually correct a lead status",
            PipelineAction::MarkLost => "mark a lead lost",
            PipelineAction::Convert => "convert a lead",
            PipelineAction::IssueLink => "issue an enrollment link",
            PipelineAction::EditPrice => "edit a quoted price",
            PipelineAction::AppendNote => "append a note",
        }
    }
}

impl fmt::Display for PipelineAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Single place answering "may this role perform this action".
///
/// Every mutating service operation consults this policy instead of
/// sprinkling role comparisons across call sites.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessPolicy;

impl AccessPolicy {
    pub fn allows(&self, role: Role, action: PipelineAction) -> bool {
        match action {
            PipelineAction::ManualStatusCorrection => {
                matches!(role, Role::Admin | Role::Director)
            }
            _ => true,
        }
    }
}
