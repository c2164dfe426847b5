use std::sync::{Arc, Mutex};

use dashd::Supervisor;

use crate::limit::RateLimit;

/// Shared state behind every handler: the supervisor and the optional
/// process-wide rate limiter. `None` means no limiting at all.
#[derive(Clone)]
pub struct WebState {
    pub supervisor: Arc<Supervisor>,
    pub limiter: Option<Arc<Mutex<RateLimit>>>,
}

impl WebState {
    pub fn new(supervisor: Arc<Supervisor>, limiter: Option<RateLimit>) -> Self {
        Self {
            supervisor,
            limiter: limiter.map(|limit| Arc::new(Mutex::new(limit))),
        }
    }

    /// True when a configured limiter denies the request. A missing limiter
    /// is a pass-through.
    pub fn rate_limited(&self) -> bool {
        match &self.limiter {
            Some(limiter) => !limiter
                .lock()
                .unwrap_or_else(|err| err.into_inner())
                .try_consume(),
            None => false,
        }
    }
}
