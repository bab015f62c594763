use tfam_model::JobName;

use crate::{error::CoreError, store::StoreLayout};

/// Tunables of a session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Fraction of primary parameter servers allowed to fail.
    pub ps_failure_threshold: f64,
    /// Fraction of primary workers allowed to fail.
    pub worker_failure_threshold: f64,
    /// Key layout inside the coordination store.
    pub layout: StoreLayout,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ps_failure_threshold: 0.0,
            worker_failure_threshold: 0.1,
            layout: StoreLayout::default(),
        }
    }
}

impl SessionConfig {
    pub fn with_thresholds(mut self, ps: f64, worker: f64) -> Self {
        self.ps_failure_threshold = ps;
        self.worker_failure_threshold = worker;
        self
    }

    pub fn with_layout(mut self, layout: StoreLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn threshold(&self, job: JobName) -> f64 {
        match job {
            JobName::Ps => self.ps_failure_threshold,
            JobName::Worker => self.worker_failure_threshold,
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        for job in JobName::ALL {
            let t = self.threshold(job);
            if !(0.0..=1.0).contains(&t) {
                return Err(CoreError::InvalidConfig(format!(
                    "{job} failure threshold must be within [0, 1], got {t}"
                )));
            }
        }
        self.layout.validate()
    }
}
