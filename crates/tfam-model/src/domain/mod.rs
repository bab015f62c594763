mod job_name;
pub use job_name::JobName;

mod job_spec;
pub use job_spec::{JobCatalog, JobSpec};

mod container;
pub use container::{Container, ContainerId};

mod session_id;
pub use session_id::SessionId;

mod task;
pub use task::Task;

mod session_status;
pub use session_status::{FinalStatus, SessionPhase, SessionStatus};

mod cluster_spec;
pub use cluster_spec::ClusterSpec;

mod events;
pub use events::{CompletionReport, EndpointRegistered};

/// Task index inside a job.
///
/// For primaries this is the slot position; for standbys it is derived at binding time.
pub type TaskIndex = usize;

/// `host:port` string a task publishes for its peers.
pub type Endpoint = String;
