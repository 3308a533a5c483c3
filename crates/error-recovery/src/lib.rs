//! Error classification and adaptive recovery.
//!
//! The classifier maps browser-agent failures onto the shared error
//! taxonomy with a confidence and an ordered list of recovery actions.
//! The recovery service runs those actions, learning from persisted
//! outcomes: action sequences that worked before for an error kind are
//! tried first the next time.

mod classifier;
mod history;
mod service;
mod types;

pub use classifier::classify;
pub use history::{InMemoryRecoveryHistory, RecoveryHistoryStore, RecoveryOutcome};
pub use service::{ErrorRecoveryService, RecoveryConfig};
pub use types::{ErrorClassification, RecoveryAction, RecoveryContext, RecoveryResult};
