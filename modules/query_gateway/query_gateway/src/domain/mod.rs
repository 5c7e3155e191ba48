//! Domain layer for the query gateway.

pub mod admission;
pub mod classifier;
pub mod dispatcher;
pub mod error;
pub mod execution_mode;
pub mod query_tags;
pub mod response;
pub mod service;
pub mod validator;
