//! Request-scoped query tags.
//!
//! Tags live in a task-local for the duration of one `run` call so that the
//! engine (and anything it logs) can read them without threading them through
//! every signature.

use std::cell::RefCell;
use std::future::Future;

use query_gateway_sdk::AccessMethod;

tokio::task_local! {
    static QUERY_TAGS: RefCell<QueryTags>;
}

/// Tags attached to the queries of the current request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryTags {
    pub access_method: Option<AccessMethod>,
    pub client_query_id: Option<String>,
}

impl QueryTags {
    #[must_use]
    pub fn for_access_method(access_method: AccessMethod) -> Self {
        Self {
            access_method: Some(access_method),
            client_query_id: None,
        }
    }
}

/// Runs `fut` with `tags` as the ambient query tags.
pub async fn scope<F>(tags: QueryTags, fut: F) -> F::Output
where
    F: Future,
{
    QUERY_TAGS.scope(RefCell::new(tags), fut).await
}

/// Snapshot of the ambient tags, empty outside of [`scope`].
#[must_use]
pub fn current() -> QueryTags {
    QUERY_TAGS
        .try_with(|tags| tags.borrow().clone())
        .unwrap_or_default()
}

/// Ambient access method, if any.
#[must_use]
pub fn access_method() -> Option<AccessMethod> {
    QUERY_TAGS
        .try_with(|tags| tags.borrow().access_method)
        .ok()
        .flatten()
}

/// Attaches a caller-supplied correlation id to the ambient tags and the current span.
///
/// No-op for `None` or an empty id.
pub fn tag_client_query_id(client_query_id: Option<&str>) {
    let Some(id) = client_query_id.filter(|id| !id.is_empty()) else {
        return;
    };

    let tagged = QUERY_TAGS
        .try_with(|tags| tags.borrow_mut().client_query_id = Some(id.to_owned()))
        .is_ok();
    if !tagged {
        tracing::debug!(client_query_id = id, "No query tag scope active");
    }

    tracing::Span::current().record("client_query_id", id);
}
