use std::time::{Duration, Instant};

use tfam_model::SessionId;

/// Identity of one session, created once and shared by every component.
#[derive(Debug, Clone)]
pub struct SessionContext {
    session_id: SessionId,
    host: String,
    started_at: Instant,
}

impl SessionContext {
    /// Fresh context with a random session id and the local host name.
    pub fn new() -> Self {
        Self::with_id(SessionId::from(uuid::Uuid::new_v4().to_string()))
    }

    pub fn with_id(session_id: SessionId) -> Self {
        Self {
            session_id,
            host: local_host(),
            started_at: Instant::now(),
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Host the application master runs on.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

fn local_host() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
