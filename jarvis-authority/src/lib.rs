#![deny(missing_docs)]
//! # jarvis-authority — Authority and Confirmation Workflow

pub mod authority;
pub mod confirmation;

pub use authority::{Authority, AuthorityError, Decision, DecisionStatus};
pub use confirmation::{ConfirmationOutcome, ConfirmationWorkflow, DEFAULT_EXPIRES_IN_SECONDS};
