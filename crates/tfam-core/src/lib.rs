//! Session core of the training application master.
//!
//! Binds granted containers to task slots, accumulates and publishes the cluster
//! topology, and applies the fault-tolerance policy that decides the final
//! status of the session.

pub mod error;
pub use error::CoreError;

mod config;
pub use config::SessionConfig;

mod context;
pub use context::SessionContext;

pub mod store;
pub use store::{CoordinationStore, MemoryStore, StoreError, StoreEvent, StoreLayout};

mod resources;
pub use resources::{NodeManager, ResourceManager};

mod metrics;
pub use metrics::{CompletionOutcomeKind, MetricsBackend, NoopMetrics};

pub mod registry;
pub use registry::{CompletionOutcome, RegistrySnapshot, TaskRegistry};

pub mod cluster;
pub use cluster::{ClusterSpecBuilder, Registration};

pub mod policy;
pub use policy::FaultPolicy;

mod session;
pub use session::SessionCoordinator;
