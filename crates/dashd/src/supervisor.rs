//! Lifecycle management for externally spawned agent processes.

use chrono::Utc;
use dash_agents::{default_adapter_for, resolve_binary, AgentError, LaunchRequest};
use dash_core::ident;
use dash_core::scenario::effective_timeout;
use dash_core::types::{
    derive_name, normalize_capabilities, Agent, AgentKind, AgentMetrics, AgentMode, AgentStatus,
    AgentSummary, StartRequest,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::time::Instant;

use crate::error::SupervisorError;
use crate::handle::{AgentTaskHooks, ManagedAgent};
use crate::ring_log::{LogStream, RingLog};
use crate::sampler::{MetricsSampler, METRICS_INTERVAL, SAMPLE_TIMEOUT};

/// How long `stop` waits on the termination latch before marking the agent
/// stopped anyway.
pub const STOP_GRACE: Duration = Duration::from_secs(5);

/// How long a cancelled child gets between the interrupt and the force-kill.
pub const KILL_GRACE: Duration = Duration::from_secs(2);

/// Starting agents that survive this long count as running even without
/// output.
pub const RUN_GRACE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub default_timeout: Duration,
    pub log_dir: PathBuf,
    pub scenario_root: PathBuf,
    /// Directories scanned for agent binaries before `PATH`.
    pub extra_bin_dirs: Vec<PathBuf>,
}

/// Owns every managed agent. Handles are registered on start and removed
/// only at teardown; completed agents stay queryable.
pub struct Supervisor {
    agents: Mutex<HashMap<String, Arc<ManagedAgent>>>,
    default_timeout_secs: AtomicU64,
    log_dir: PathBuf,
    scenario_root: PathBuf,
    extra_bin_dirs: Vec<PathBuf>,
    id_counter: AtomicU64,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            agents: Mutex::new(HashMap::new()),
            default_timeout_secs: AtomicU64::new(config.default_timeout.as_secs().max(1)),
            log_dir: config.log_dir,
            scenario_root: config.scenario_root,
            extra_bin_dirs: config.extra_bin_dirs,
            id_counter: AtomicU64::new(1),
        }
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs.load(Ordering::Relaxed))
    }

    pub fn scenario_root(&self) -> &PathBuf {
        &self.scenario_root
    }

    pub fn log_file_path(&self, id: &str) -> PathBuf {
        self.log_dir.join(format!("{}.log", id.replace(':', "_")))
    }

    /// Validate a start request, register a handle, launch the child, and
    /// attach its pumps, run-grace task, metrics sampler, and termination
    /// waiter. Every pre-spawn failure rolls back the registration.
    pub async fn start(&self, request: StartRequest) -> Result<Agent, SupervisorError> {
        let task = request.task.trim().to_string();
        if task.is_empty() {
            return Err(SupervisorError::InvalidArgument {
                message: "task must not be empty".to_string(),
            });
        }

        let mode = match request.mode.as_deref().map(str::trim) {
            None | Some("") => AgentMode::default(),
            Some(raw) => raw
                .parse::<AgentMode>()
                .map_err(|message| SupervisorError::InvalidArgument { message })?,
        };

        let explicit_id = match request.id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                if !ident::is_valid_agent_id(raw) {
                    return Err(SupervisorError::InvalidArgument {
                        message: format!("malformed agent id '{raw}'"),
                    });
                }
                Some(raw.to_string())
            }
        };

        let kind = explicit_id
            .as_deref()
            .and_then(|id| id.split_once(':'))
            .and_then(|(resource, _)| resource.parse::<AgentKind>().ok())
            .unwrap_or_default();

        let capabilities = normalize_capabilities(&request.capabilities.unwrap_or_default());
        let timeout = match request.timeout_seconds {
            Some(secs) if secs > 0 => Duration::from_secs(secs as u64),
            _ => self.default_timeout(),
        };

        let adapter = default_adapter_for(kind);
        let binary = resolve_binary(adapter.executable(), &self.extra_bin_dirs)?;
        let launch = LaunchRequest::new(
            task.clone(),
            mode,
            self.scenario_root.clone(),
            request.notes.unwrap_or_default(),
        )?;
        let command = adapter.build_command(&launch);
        let name = derive_name(request.name.as_deref(), &task);

        // Register the handle; the map lock covers only the id reservation.
        let (id, handle, hooks) = {
            let mut agents = self.agents();
            let id = match explicit_id {
                Some(id) => {
                    if agents.contains_key(&id) {
                        return Err(SupervisorError::Conflict { id });
                    }
                    id
                }
                None => loop {
                    let candidate = self.generate_id();
                    if !agents.contains_key(&candidate) {
                        break candidate;
                    }
                },
            };
            let agent = Agent::new(id.clone(), name, kind, task, mode, capabilities);
            let (handle, hooks) = ManagedAgent::new(agent, RingLog::new(None));
            agents.insert(id.clone(), Arc::clone(&handle));
            (id, handle, hooks)
        };

        let log_path = self.log_file_path(&id);
        let log_file = std::fs::create_dir_all(&self.log_dir)
            .and_then(|()| std::fs::File::create(&log_path));
        let log_file = match log_file {
            Ok(file) => file,
            Err(err) => {
                self.remove_handle(&id);
                eprintln!(
                    "[supervisor] failed to create log file {}: {err}",
                    log_path.display()
                );
                return Err(SupervisorError::Internal {
                    message: "failed to create agent log file".to_string(),
                });
            }
        };
        handle.attach_log_file(log_file);

        let mut child = match Command::new(&binary)
            .args(&command.args)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&self.scenario_root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(err) => {
                self.remove_handle(&id);
                let _ = std::fs::remove_file(&log_path);
                return Err(AgentError::Spawn {
                    message: err.to_string(),
                }
                .into());
            }
        };

        let pid = child.id().unwrap_or(0);
        handle.set_pid(pid);

        let mut pumps = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            pumps.push(spawn_pump(Arc::clone(&handle), LogStream::Stdout, stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(spawn_pump(Arc::clone(&handle), LogStream::Stderr, stderr));
        }

        {
            let handle = Arc::clone(&handle);
            tokio::spawn(async move {
                tokio::time::sleep(RUN_GRACE).await;
                handle.set_running_if_starting();
            });
        }

        let sampler = Arc::new(Mutex::new(MetricsSampler::new()));
        spawn_sampler(Arc::clone(&handle), Arc::clone(&sampler), pid as i32);

        let deadline = Instant::now() + timeout;
        spawn_waiter(WaiterArgs {
            handle: Arc::clone(&handle),
            hooks,
            child,
            deadline,
            sampler,
            pid: pid as i32,
            pumps,
        });

        Ok(handle.snapshot())
    }

    /// Stop an agent. Idempotent: stopping a terminal agent returns the
    /// snapshot unchanged.
    pub async fn stop(&self, id: &str) -> Result<Agent, SupervisorError> {
        let handle = self.lookup(id)?;
        if handle.is_terminal() {
            return Ok(handle.snapshot());
        }

        handle.request_stop();
        let mut done_rx = handle.done_rx();
        match tokio::time::timeout(STOP_GRACE, done_rx.wait_for(|done| *done)).await {
            Ok(Ok(_)) => {}
            _ => {
                handle.append_line(
                    LogStream::Stderr,
                    "stop grace elapsed before the agent terminated; marking stopped",
                );
                handle.mark_terminal(AgentStatus::Stopped, None, Utc::now());
            }
        }
        Ok(handle.snapshot())
    }

    pub fn get(&self, id: &str) -> Result<Agent, SupervisorError> {
        Ok(self.lookup(id)?.snapshot())
    }

    /// All agents sorted by start time descending, plus the status summary.
    pub fn snapshot(&self) -> (Vec<Agent>, AgentSummary) {
        let handles: Vec<Arc<ManagedAgent>> = self.agents().values().cloned().collect();
        let mut agents: Vec<Agent> = handles.iter().map(|handle| handle.snapshot()).collect();
        agents.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        let summary = AgentSummary::tally(agents.iter().map(|agent| agent.status));
        (agents, summary)
    }

    /// Agent ids in insertion order (oldest first), for short-name resolution.
    pub fn known_ids(&self) -> Vec<String> {
        let handles: Vec<Arc<ManagedAgent>> = self.agents().values().cloned().collect();
        let mut entries: Vec<_> = handles
            .iter()
            .map(|handle| (handle.start_time(), handle.id()))
            .collect();
        entries.sort();
        entries.into_iter().map(|(_, id)| id).collect()
    }

    pub fn logs(&self, id: &str, line_count: usize) -> Result<Vec<String>, SupervisorError> {
        if !(ident::MIN_LINE_COUNT..=ident::MAX_LINE_COUNT).contains(&line_count) {
            return Err(SupervisorError::InvalidArgument {
                message: format!(
                    "line count must be between {} and {}",
                    ident::MIN_LINE_COUNT,
                    ident::MAX_LINE_COUNT
                ),
            });
        }
        Ok(self.lookup(id)?.tail(line_count))
    }

    /// The last sampled metrics mapping; frozen once the agent is terminal.
    pub fn metrics(&self, id: &str) -> Result<AgentMetrics, SupervisorError> {
        Ok(self.lookup(id)?.metrics())
    }

    /// Re-read the scenario config and refresh the default timeout.
    pub fn rescan(&self) {
        let timeout = effective_timeout(&self.scenario_root);
        self.default_timeout_secs
            .store(timeout.as_secs().max(1), Ordering::Relaxed);
    }

    /// Cancel every live agent, await each termination latch bounded by the
    /// stop grace, then clear the map.
    pub async fn shutdown(&self) {
        let handles: Vec<Arc<ManagedAgent>> = self.agents().values().cloned().collect();
        for handle in &handles {
            if !handle.is_terminal() {
                handle.cancel();
            }
        }
        for handle in handles {
            let mut done_rx = handle.done_rx();
            let _ = tokio::time::timeout(STOP_GRACE, done_rx.wait_for(|done| *done)).await;
        }
        self.agents().clear();
    }

    fn agents(&self) -> MutexGuard<'_, HashMap<String, Arc<ManagedAgent>>> {
        self.agents.lock().unwrap_or_else(|err| err.into_inner())
    }

    fn lookup(&self, id: &str) -> Result<Arc<ManagedAgent>, SupervisorError> {
        self.agents()
            .get(id)
            .cloned()
            .ok_or_else(|| SupervisorError::NotFound { id: id.to_string() })
    }

    fn remove_handle(&self, id: &str) {
        self.agents().remove(id);
    }

    fn generate_id(&self) -> String {
        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64;
        let count = self.id_counter.fetch_add(1, Ordering::Relaxed);
        let seed = (nanos ^ count.wrapping_mul(0x9e37_79b9_7f4a_7c15)) as u32;
        format!("codex:{seed:08x}")
    }
}

fn spawn_pump(
    handle: Arc<ManagedAgent>,
    stream: LogStream,
    reader: impl AsyncRead + Unpin + Send + 'static,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => handle.append_line(stream, &line),
                Ok(None) => break,
                Err(err) => {
                    // Read errors never change status; the waiter decides.
                    handle
                        .append_line(LogStream::Stderr, &format!("log pump read error: {err}"));
                    break;
                }
            }
        }
    })
}

fn spawn_sampler(handle: Arc<ManagedAgent>, sampler: Arc<Mutex<MetricsSampler>>, pid: i32) {
    let mut done_rx = handle.done_rx();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(METRICS_INTERVAL);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = done_rx.changed() => {
                    if *done_rx.borrow() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let shared = Arc::clone(&sampler);
                    let sampled = tokio::task::spawn_blocking(move || {
                        shared
                            .lock()
                            .map(|mut guard| guard.sample(pid))
                            .unwrap_or_default()
                    });
                    match tokio::time::timeout(SAMPLE_TIMEOUT, sampled).await {
                        Ok(Ok(metrics)) => handle.record_metrics(metrics),
                        // Past the sample budget the previous values stand.
                        _ => {}
                    }
                }
            }
        }
    });
}

#[derive(Clone, Copy)]
enum WaitOutcome {
    Exited(Option<std::process::ExitStatus>),
    DeadlineElapsed,
    Cancelled,
}

struct WaiterArgs {
    handle: Arc<ManagedAgent>,
    hooks: AgentTaskHooks,
    child: Child,
    deadline: Instant,
    sampler: Arc<Mutex<MetricsSampler>>,
    pid: i32,
    pumps: Vec<tokio::task::JoinHandle<()>>,
}

fn spawn_waiter(args: WaiterArgs) {
    let WaiterArgs {
        handle,
        hooks,
        mut child,
        deadline,
        sampler,
        pid,
        pumps,
    } = args;
    let AgentTaskHooks {
        mut cancel_rx,
        done_tx,
    } = hooks;

    tokio::spawn(async move {
        let outcome = tokio::select! {
            status = child.wait() => WaitOutcome::Exited(status.ok()),
            _ = tokio::time::sleep_until(deadline) => WaitOutcome::DeadlineElapsed,
            _ = cancel_rx.wait_for(|cancelled| *cancelled) => WaitOutcome::Cancelled,
        };

        let timed_out = matches!(outcome, WaitOutcome::DeadlineElapsed);
        let (status, exit_code) = match outcome {
            WaitOutcome::Exited(exit) => {
                let code = exit.and_then(|status| status.code());
                let status = match code {
                    Some(0) => AgentStatus::Completed,
                    _ if handle.stop_requested() => AgentStatus::Stopped,
                    _ => AgentStatus::Failed,
                };
                (status, code)
            }
            WaitOutcome::DeadlineElapsed | WaitOutcome::Cancelled => {
                interrupt_child(pid);
                let exit = match tokio::time::timeout(KILL_GRACE, child.wait()).await {
                    Ok(result) => result.ok(),
                    Err(_) => {
                        let _ = child.kill().await;
                        child.wait().await.ok()
                    }
                };
                let status = if timed_out {
                    AgentStatus::Timeout
                } else {
                    AgentStatus::Stopped
                };
                (status, exit.and_then(|status| status.code()))
            }
        };

        // Let the pumps drain whatever remains in the pipes, bounded so a
        // grandchild holding the write end cannot wedge the waiter.
        let drain_deadline = Instant::now() + KILL_GRACE;
        for pump in pumps {
            let _ = tokio::time::timeout_at(drain_deadline, pump).await;
        }

        // One final sample; a vanished pid keeps the last ticker values.
        let final_metrics = sampler
            .lock()
            .map(|mut guard| guard.sample(pid))
            .unwrap_or_default();
        if final_metrics != AgentMetrics::default() {
            handle.record_metrics(final_metrics);
        }

        handle.mark_terminal(status, exit_code, Utc::now());
        handle.close_log_file();
        let _ = done_tx.send(true);
    });
}

fn interrupt_child(pid: i32) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if pid > 0 {
            let _ = kill(Pid::from_raw(pid), Signal::SIGINT);
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        supervisor: Supervisor,
        _bin: TempDir,
        _logs: TempDir,
        _scenario: TempDir,
        log_dir: PathBuf,
        scenario_root: PathBuf,
    }

    #[cfg(unix)]
    fn fixture_with_stub(script_body: &str, default_timeout: Duration) -> Fixture {
        use std::os::unix::fs::PermissionsExt;

        let bin = TempDir::new().expect("bin tempdir");
        let stub = bin.path().join("codex");
        std::fs::write(&stub, format!("#!/bin/sh\n{script_body}\n")).expect("write stub");
        let mut perms = std::fs::metadata(&stub).expect("stat stub").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&stub, perms).expect("chmod stub");

        let logs = TempDir::new().expect("log tempdir");
        let scenario = TempDir::new().expect("scenario tempdir");
        let log_dir = logs.path().to_path_buf();
        let scenario_root = scenario.path().to_path_buf();

        let supervisor = Supervisor::new(SupervisorConfig {
            default_timeout,
            log_dir: log_dir.clone(),
            scenario_root: scenario_root.clone(),
            extra_bin_dirs: vec![bin.path().to_path_buf()],
        });

        Fixture {
            supervisor,
            _bin: bin,
            _logs: logs,
            _scenario: scenario,
            log_dir,
            scenario_root,
        }
    }

    fn bare_fixture() -> Fixture {
        let bin = TempDir::new().expect("bin tempdir");
        let logs = TempDir::new().expect("log tempdir");
        let scenario = TempDir::new().expect("scenario tempdir");
        let log_dir = logs.path().to_path_buf();
        let scenario_root = scenario.path().to_path_buf();

        let supervisor = Supervisor::new(SupervisorConfig {
            default_timeout: Duration::from_secs(10),
            log_dir: log_dir.clone(),
            scenario_root: scenario_root.clone(),
            extra_bin_dirs: vec![bin.path().to_path_buf()],
        });

        Fixture {
            supervisor,
            _bin: bin,
            _logs: logs,
            _scenario: scenario,
            log_dir,
            scenario_root,
        }
    }

    fn start_request(task: &str) -> StartRequest {
        StartRequest {
            task: task.to_string(),
            ..StartRequest::default()
        }
    }

    async fn wait_terminal(supervisor: &Supervisor, id: &str) -> Agent {
        for _ in 0..400 {
            let agent = supervisor.get(id).expect("agent exists");
            if agent.status.is_terminal() {
                return agent;
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
        panic!("agent {id} did not reach a terminal status in time");
    }

    #[tokio::test]
    async fn start_rejects_blank_task() {
        let fixture = bare_fixture();
        let err = fixture
            .supervisor
            .start(start_request("   "))
            .await
            .expect_err("blank task should fail");
        assert!(matches!(err, SupervisorError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn start_rejects_unknown_mode() {
        let fixture = bare_fixture();
        let mut request = start_request("do it");
        request.mode = Some("turbo".to_string());
        let err = fixture
            .supervisor
            .start(request)
            .await
            .expect_err("unknown mode should fail");
        assert!(matches!(err, SupervisorError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn start_rejects_malformed_explicit_id() {
        let fixture = bare_fixture();
        let mut request = start_request("do it");
        request.id = Some("not-a-valid@id".to_string());
        let err = fixture
            .supervisor
            .start(request)
            .await
            .expect_err("malformed id should fail");
        assert!(matches!(err, SupervisorError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn lookups_on_unknown_ids_are_not_found() {
        let fixture = bare_fixture();
        assert!(matches!(
            fixture.supervisor.get("codex:nosuch"),
            Err(SupervisorError::NotFound { .. })
        ));
        assert!(matches!(
            fixture.supervisor.metrics("codex:nosuch"),
            Err(SupervisorError::NotFound { .. })
        ));
        assert!(matches!(
            fixture.supervisor.logs("codex:nosuch", 100),
            Err(SupervisorError::NotFound { .. })
        ));
        assert!(matches!(
            fixture.supervisor.stop("codex:nosuch").await,
            Err(SupervisorError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn logs_line_count_is_range_checked() {
        let fixture = bare_fixture();
        for count in [0usize, 10_001, 99_999] {
            let err = fixture
                .supervisor
                .logs("codex:any", count)
                .expect_err("out-of-range count should fail");
            assert!(matches!(err, SupervisorError::InvalidArgument { .. }));
        }
    }

    #[test]
    fn rescan_refreshes_default_timeout_from_scenario_config() {
        let fixture = bare_fixture();
        let config_dir = fixture.scenario_root.join("initialization/configuration");
        std::fs::create_dir_all(&config_dir).expect("create config dir");
        std::fs::write(
            config_dir.join("codex-config.json"),
            r#"{"investigation_settings":{"timeout_seconds":42}}"#,
        )
        .expect("write codex config");

        assert_eq!(fixture.supervisor.default_timeout(), Duration::from_secs(10));
        fixture.supervisor.rescan();
        assert_eq!(fixture.supervisor.default_timeout(), Duration::from_secs(42));
    }

    #[test]
    fn log_file_path_sanitizes_the_id() {
        let fixture = bare_fixture();
        let path = fixture.supervisor.log_file_path("codex:abc");
        assert_eq!(path, fixture.log_dir.join("codex_abc.log"));
    }

    #[cfg(unix)]
    mod with_children {
        use super::*;

        #[tokio::test(flavor = "multi_thread")]
        async fn start_returns_starting_snapshot_with_generated_id() {
            let fixture = fixture_with_stub("echo hi", Duration::from_secs(10));
            let agent = fixture
                .supervisor
                .start(start_request("say hi"))
                .await
                .expect("start agent");

            let (resource, local) = agent.id.split_once(':').expect("id has resource prefix");
            assert_eq!(resource, "codex");
            assert_eq!(local.len(), 8);
            assert!(local.bytes().all(|b| b.is_ascii_hexdigit()));
            assert!(matches!(
                agent.status,
                AgentStatus::Starting | AgentStatus::Running
            ));
            assert!(agent.pid > 0);
            assert_eq!(agent.task, "say hi");
            assert!(agent.end_time.is_none());
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn agent_completes_and_captures_both_streams() {
            let fixture =
                fixture_with_stub("echo out-line\necho err-line >&2", Duration::from_secs(10));
            let agent = fixture
                .supervisor
                .start(start_request("emit output"))
                .await
                .expect("start agent");

            let finished = wait_terminal(&fixture.supervisor, &agent.id).await;
            assert_eq!(finished.status, AgentStatus::Completed);
            assert_eq!(finished.exit_code, Some(0));
            assert!(finished.end_time.is_some());
            assert!(finished.end_time.expect("end time") >= finished.start_time);

            let logs = fixture
                .supervisor
                .logs(&agent.id, 100)
                .expect("fetch logs");
            assert!(logs.contains(&"[STDOUT] out-line".to_string()));
            assert!(logs.contains(&"[STDERR] err-line".to_string()));
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn ring_and_file_agree_with_bounded_memory() {
            let body = "i=0\nwhile [ $i -lt 1200 ]; do echo line-$i; i=$((i+1)); done";
            let fixture = fixture_with_stub(body, Duration::from_secs(30));
            let agent = fixture
                .supervisor
                .start(start_request("spam output"))
                .await
                .expect("start agent");

            let finished = wait_terminal(&fixture.supervisor, &agent.id).await;
            assert_eq!(finished.status, AgentStatus::Completed);

            let logs = fixture
                .supervisor
                .logs(&agent.id, 10_000)
                .expect("fetch logs");
            assert_eq!(logs.len(), crate::ring_log::MAX_LOG_LINES);
            assert_eq!(logs.last(), Some(&"[STDOUT] line-1199".to_string()));

            // The file keeps everything, in emission order.
            let content = std::fs::read_to_string(fixture.supervisor.log_file_path(&agent.id))
                .expect("read log file");
            let file_lines: Vec<&str> = content.lines().collect();
            assert_eq!(file_lines.len(), 1200);
            assert_eq!(file_lines[0], "[STDOUT] line-0");
            assert_eq!(file_lines[1199], "[STDOUT] line-1199");
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn nonzero_exit_marks_failed_with_exit_code() {
            let fixture = fixture_with_stub("echo oops >&2\nexit 3", Duration::from_secs(10));
            let agent = fixture
                .supervisor
                .start(start_request("fail fast"))
                .await
                .expect("start agent");

            let finished = wait_terminal(&fixture.supervisor, &agent.id).await;
            assert_eq!(finished.status, AgentStatus::Failed);
            assert_eq!(finished.exit_code, Some(3));
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn duplicate_explicit_id_conflicts() {
            let fixture = fixture_with_stub("exec sleep 30", Duration::from_secs(60));
            let mut request = start_request("first");
            request.id = Some("codex:dup".to_string());
            fixture
                .supervisor
                .start(request.clone())
                .await
                .expect("first start succeeds");

            request.task = "second".to_string();
            let err = fixture
                .supervisor
                .start(request)
                .await
                .expect_err("duplicate id should fail");
            assert!(matches!(err, SupervisorError::Conflict { id } if id == "codex:dup"));

            fixture.supervisor.shutdown().await;
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn stop_terminates_and_is_idempotent() {
            let fixture = fixture_with_stub("exec sleep 30", Duration::from_secs(60));
            let agent = fixture
                .supervisor
                .start(start_request("long task"))
                .await
                .expect("start agent");

            let stopped = fixture.supervisor.stop(&agent.id).await.expect("stop");
            assert_eq!(stopped.status, AgentStatus::Stopped);
            assert!(stopped.end_time.is_some());

            let again = fixture.supervisor.stop(&agent.id).await.expect("stop again");
            assert_eq!(again.status, stopped.status);
            assert_eq!(again.end_time, stopped.end_time);
            assert_eq!(again.exit_code, stopped.exit_code);
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn timeout_marks_agent_timed_out() {
            let fixture = fixture_with_stub("exec sleep 30", Duration::from_secs(60));
            let mut request = start_request("sleepy");
            request.timeout_seconds = Some(1);
            let agent = fixture
                .supervisor
                .start(request)
                .await
                .expect("start agent");

            let finished = wait_terminal(&fixture.supervisor, &agent.id).await;
            assert_eq!(finished.status, AgentStatus::Timeout);
            let end = finished.end_time.expect("end time set");
            assert!((end - finished.start_time).num_milliseconds() >= 1_000);
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn snapshot_sorts_newest_first_and_tallies() {
            let fixture = fixture_with_stub("echo done", Duration::from_secs(10));
            let first = fixture
                .supervisor
                .start(start_request("first"))
                .await
                .expect("start first");
            tokio::time::sleep(Duration::from_millis(10)).await;
            let second = fixture
                .supervisor
                .start(start_request("second"))
                .await
                .expect("start second");

            wait_terminal(&fixture.supervisor, &first.id).await;
            wait_terminal(&fixture.supervisor, &second.id).await;

            let (agents, summary) = fixture.supervisor.snapshot();
            assert_eq!(agents.len(), 2);
            assert_eq!(agents[0].id, second.id);
            assert_eq!(agents[1].id, first.id);
            assert_eq!(summary.total, 2);
            assert_eq!(summary.completed, 2);
            assert_eq!(summary.running, 0);
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn known_ids_keep_insertion_order() {
            let fixture = fixture_with_stub("echo done", Duration::from_secs(10));
            let first = fixture
                .supervisor
                .start(start_request("first"))
                .await
                .expect("start first");
            tokio::time::sleep(Duration::from_millis(10)).await;
            let second = fixture
                .supervisor
                .start(start_request("second"))
                .await
                .expect("start second");

            assert_eq!(fixture.supervisor.known_ids(), vec![first.id, second.id]);
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn metrics_available_for_live_and_terminal_agents() {
            let fixture = fixture_with_stub("echo done", Duration::from_secs(10));
            let agent = fixture
                .supervisor
                .start(start_request("metrics"))
                .await
                .expect("start agent");

            // Never an error, even before the first sample.
            let live = fixture.supervisor.metrics(&agent.id).expect("live metrics");
            assert!(live.cpu_percent >= 0.0);

            wait_terminal(&fixture.supervisor, &agent.id).await;
            let frozen = fixture
                .supervisor
                .metrics(&agent.id)
                .expect("frozen metrics");
            let again = fixture
                .supervisor
                .metrics(&agent.id)
                .expect("frozen metrics again");
            assert_eq!(frozen, again);
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn shutdown_cancels_live_agents_and_clears_the_map() {
            let fixture = fixture_with_stub("exec sleep 30", Duration::from_secs(60));
            fixture
                .supervisor
                .start(start_request("will be torn down"))
                .await
                .expect("start agent");

            fixture.supervisor.shutdown().await;

            let (agents, summary) = fixture.supervisor.snapshot();
            assert!(agents.is_empty());
            assert_eq!(summary.total, 0);
        }
    }
}
