//! Completion-aware response shaping.

use serde_json::{Map, Value};

/// Whether the engine finished the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Result is final (HTTP 200).
    Complete,
    /// Result is present but the engine reported `complete: false` (HTTP 202).
    Incomplete,
}

/// Successful outcome of a `run` call.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub completion: Completion,
    pub body: Map<String, Value>,
}

/// Picks the completion status for `body`, which is returned unchanged.
///
/// Only an explicit `query_status.complete == false` marks the result incomplete.
#[must_use]
pub fn shape(body: Map<String, Value>) -> QueryOutcome {
    let incomplete = body
        .get("query_status")
        .and_then(Value::as_object)
        .and_then(|status| status.get("complete"))
        .and_then(Value::as_bool)
        == Some(false);

    QueryOutcome {
        completion: if incomplete {
            Completion::Incomplete
        } else {
            Completion::Complete
        },
        body,
    }
}
