//! Data model of a distributed training session.
//!
//! Types here are shared by the session core, the API surface and anything that
//! parses the published cluster topology.

mod domain;
pub use domain::*;

mod error;
pub use error::ModelError;
