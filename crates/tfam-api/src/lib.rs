//! Completion-report and status surface of a training session.
//!
//! Task executors report their exit codes through [`ApiHandler`]; operators
//! read the session status and the cluster spec through it. [`HttpApi`]
//! mounts the handler on an axum router (feature `http`).

mod error;
pub use error::ApiError;

mod view;
pub use view::{CompletionAck, SessionView};

mod handler;
pub use handler::ApiHandler;

mod adapter;
pub use adapter::SessionApiAdapter;

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::HttpApi;

#[cfg(feature = "http")]
pub use axum;
