//! Sales-CRM core for an educational institution: the lead pipeline state
//! machine, conversion settlement, enrollment links, value-limit policy, and
//! the audit trail behind them.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod telemetry;
