//! HTTP surface of the query gateway.

pub mod error;
pub mod handlers;
pub mod problem;
pub mod routes;
pub mod throttle;

pub use problem::{APPLICATION_PROBLEM_JSON, Problem};
pub use routes::{RUN_QUERY_PATH, router};
pub use throttle::RequestThrottle;
