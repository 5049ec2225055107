//! Kind-specific execution strategies. Each exposes one entry point taking
//! the assertion, its target location, and the shared environment context,
//! and returns a structured result.

pub mod api;
pub mod sql;
pub mod ui;

use crate::model::{Assertion, AssertionResult, Status};

/// Build a result for an assertion; the runner fills in the duration.
pub fn outcome(assertion: &Assertion, status: Status, reason: impl Into<String>) -> AssertionResult {
    AssertionResult {
        id: assertion.id.clone(),
        kind: assertion.kind(),
        claim: assertion.claim.clone(),
        status,
        reason: reason.into(),
        duration_ms: 0,
    }
}
