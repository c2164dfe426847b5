//! The supervisor's private owner of one agent.

use chrono::{DateTime, Utc};
use dash_core::types::{is_transition_allowed, Agent, AgentMetrics, AgentStatus};
use std::fs::File;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

use crate::ring_log::{LogStream, RingLog};

/// Mutable per-agent state, guarded by the handle mutex.
#[derive(Debug)]
struct AgentInner {
    agent: Agent,
    ring: RingLog,
    stop_requested: bool,
}

/// Channel ends handed to the agent's background tasks at spawn time.
pub(crate) struct AgentTaskHooks {
    pub cancel_rx: watch::Receiver<bool>,
    pub done_tx: watch::Sender<bool>,
}

/// One managed agent: the public snapshot, its ring log, a cancellation
/// trigger for the child, and the termination latch.
///
/// The handle mutex guards every post-creation mutation; it is never held
/// across I/O or an await point.
pub(crate) struct ManagedAgent {
    inner: Mutex<AgentInner>,
    cancel_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
}

impl ManagedAgent {
    pub fn new(agent: Agent, ring: RingLog) -> (Arc<Self>, AgentTaskHooks) {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let (done_tx, done_rx) = watch::channel(false);
        let handle = Arc::new(Self {
            inner: Mutex::new(AgentInner {
                agent,
                ring,
                stop_requested: false,
            }),
            cancel_tx,
            done_rx,
        });
        (handle, AgentTaskHooks { cancel_rx, done_tx })
    }

    fn lock(&self) -> MutexGuard<'_, AgentInner> {
        self.inner.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Deep copy for readers: capabilities deduplicated, radar pinned.
    pub fn snapshot(&self) -> Agent {
        self.lock().agent.read_view()
    }

    pub fn id(&self) -> String {
        self.lock().agent.id.clone()
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.lock().agent.start_time
    }

    pub fn status(&self) -> AgentStatus {
        self.lock().agent.status
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn metrics(&self) -> AgentMetrics {
        self.lock().agent.metrics.clone()
    }

    pub fn tail(&self, count: usize) -> Vec<String> {
        self.lock().ring.tail(count)
    }

    pub fn set_pid(&self, pid: u32) {
        self.lock().agent.pid = pid;
    }

    pub fn attach_log_file(&self, file: File) {
        self.lock().ring.attach_file(file);
    }

    pub fn close_log_file(&self) {
        self.lock().ring.close_file();
    }

    /// Append a pump line: feeds the ring and file, bumps `last_seen`, and
    /// promotes a starting agent to running on its first observed line.
    pub fn append_line(&self, stream: LogStream, text: &str) {
        let mut inner = self.lock();
        inner.ring.append(stream, text);
        inner.agent.touch(Utc::now());
        if inner.agent.status == AgentStatus::Starting {
            inner.agent.status = AgentStatus::Running;
        }
    }

    /// The 100 ms run-grace promotion: starting agents that survived their
    /// first moments count as running even before any output arrives.
    pub fn set_running_if_starting(&self) {
        let mut inner = self.lock();
        if inner.agent.status == AgentStatus::Starting {
            inner.agent.status = AgentStatus::Running;
        }
    }

    /// Record one terminal transition. Terminal states are sticky: a second
    /// call leaves status, end time, and exit code untouched.
    pub fn mark_terminal(&self, status: AgentStatus, exit_code: Option<i32>, at: DateTime<Utc>) {
        let mut inner = self.lock();
        if inner.agent.status.is_terminal() || !is_transition_allowed(inner.agent.status, status) {
            return;
        }
        inner.agent.status = status;
        inner.agent.end_time = Some(at);
        inner.agent.exit_code = exit_code;
        inner.agent.touch(at);
    }

    /// Store a fresh metrics sample; terminal agents keep their final frozen
    /// mapping.
    pub fn record_metrics(&self, metrics: AgentMetrics) {
        let mut inner = self.lock();
        if inner.agent.status.is_terminal() {
            return;
        }
        inner.agent.metrics = metrics;
        inner.agent.touch(Utc::now());
    }

    pub fn stop_requested(&self) -> bool {
        self.lock().stop_requested
    }

    /// Flag the handle as operator-stopped and trigger cancellation.
    pub fn request_stop(&self) {
        self.lock().stop_requested = true;
        let _ = self.cancel_tx.send(true);
    }

    /// Trigger cancellation without marking an operator stop (teardown).
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    pub fn done_rx(&self) -> watch::Receiver<bool> {
        self.done_rx.clone()
    }
}
