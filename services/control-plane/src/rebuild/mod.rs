//! Rebuild orchestration.
//!
//! A rebuild runs a host-side script for one container. Per container id the
//! lifecycle is Idle → Running → Idle, guarded by [`RebuildRegistry`]:
//!
//! 1. [`RebuildOrchestrator::execute`] validates the request, claims the
//!    container's slot and broadcasts `rebuild-status-changed(rebuilding=true)`.
//! 2. A background task runs the script, broadcasting each output chunk as
//!    `script-output`.
//! 3. On exit, spawn failure or timeout the slot is released, then
//!    `rebuild-status-changed(rebuilding=false)` and `script-completed` are
//!    broadcast, in that order.

mod launcher;
mod output;
mod registry;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fleetdeck_events::{
    RebuildStatusPayload, ScriptCompletedPayload, ScriptOutputPayload, ServerEvent, StreamKind,
};
use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

pub use launcher::{HostLauncher, LaunchMode};
pub use output::Utf8Carry;
pub use registry::{RebuildJob, RebuildRegistry};

use crate::bus::EventBus;
use crate::scripts::{is_valid_script_name, ScriptDir};

/// Exit code reported for a script killed by the rebuild timeout.
pub const TIMEOUT_EXIT_CODE: i32 = 124;

/// Exit code reported when the script never started.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 1;

const READ_BUFFER: usize = 8 * 1024;

/// How long a killed script's pipes get to deliver their last bytes.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Body of an execute request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildRequest {
    #[serde(default)]
    pub script_name: Option<String>,
    #[serde(default)]
    pub container_name: Option<String>,
    #[serde(default)]
    pub container_id: Option<String>,
}

/// Reasons a rebuild was not started.
#[derive(Debug, Error)]
pub enum RebuildError {
    /// A required request field is missing or blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// The script name is not a bare file name.
    #[error("invalid script name: {0}")]
    InvalidScriptName(String),

    /// No such script in the scripts directory.
    #[error("script not found: {0}")]
    ScriptNotFound(String),

    /// The container already has a rebuild running.
    #[error("container {container_id} is already rebuilding (since {since})")]
    AlreadyRunning {
        container_id: String,
        since: DateTime<Utc>,
    },
}

/// How a rebuild ended.
#[derive(Debug)]
struct Outcome {
    output: String,
    exit_code: i32,
    error: Option<String>,
}

impl Outcome {
    fn failed(mut output: String, exit_code: i32, message: String) -> Self {
        output.push_str(&format!("\nError: {message}"));
        Self {
            output,
            exit_code,
            error: Some(message),
        }
    }

    fn success(&self) -> bool {
        self.exit_code == 0 && self.error.is_none()
    }
}

/// Starts rebuild scripts and broadcasts their progress.
#[derive(Clone)]
pub struct RebuildOrchestrator {
    registry: RebuildRegistry,
    bus: EventBus,
    scripts: ScriptDir,
    launcher: Arc<HostLauncher>,
    timeout: Option<Duration>,
}

fn required(value: Option<String>, field: &'static str) -> Result<String, RebuildError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(RebuildError::MissingField(field))
}

impl RebuildOrchestrator {
    pub fn new(
        registry: RebuildRegistry,
        bus: EventBus,
        scripts: ScriptDir,
        launcher: HostLauncher,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            registry,
            bus,
            scripts,
            launcher: Arc::new(launcher),
            timeout,
        }
    }

    pub fn registry(&self) -> &RebuildRegistry {
        &self.registry
    }

    /// Start a rebuild and return as soon as it is Running.
    ///
    /// Validation happens before any side effect. The outcome is only
    /// reported on the event bus.
    pub async fn execute(&self, request: RebuildRequest) -> Result<RebuildJob, RebuildError> {
        let script = required(request.script_name, "scriptName")?;
        let container_id = required(request.container_id, "containerId")?;
        let container_name = request
            .container_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| container_id.clone());

        if !is_valid_script_name(&script) {
            return Err(RebuildError::InvalidScriptName(script));
        }
        if !self.scripts.exists(&script).await {
            return Err(RebuildError::ScriptNotFound(script));
        }

        let job = RebuildJob {
            container_id,
            container_name,
            script,
            started_at: Utc::now(),
        };
        self.registry
            .try_begin(job.clone())
            .await
            .map_err(|running| RebuildError::AlreadyRunning {
                container_id: running.container_id,
                since: running.started_at,
            })?;

        self.bus
            .publish(ServerEvent::RebuildStatusChanged(RebuildStatusPayload {
                container_id: job.container_id.clone(),
                rebuilding: true,
                container_name: job.container_name.clone(),
                success: None,
                error: None,
            }));
        info!(
            container_id = %job.container_id,
            container_name = %job.container_name,
            script = %job.script,
            "Rebuild started"
        );

        tokio::spawn(self.clone().run(job.clone()));
        Ok(job)
    }

    async fn run(self, job: RebuildJob) {
        let local = self.scripts.path_of(&job.script);
        let outcome = self.launch(&job, &local).await;
        let success = outcome.success();

        self.registry.finish(&job.container_id).await;

        self.bus
            .publish(ServerEvent::RebuildStatusChanged(RebuildStatusPayload {
                container_id: job.container_id.clone(),
                rebuilding: false,
                container_name: job.container_name.clone(),
                success: Some(success),
                error: outcome.error.clone(),
            }));
        self.bus
            .publish(ServerEvent::ScriptCompleted(ScriptCompletedPayload {
                container_id: job.container_id.clone(),
                container_name: job.container_name.clone(),
                output: outcome.output,
                exit_code: outcome.exit_code,
                success,
                error: outcome.error,
            }));

        if success {
            info!(container_id = %job.container_id, script = %job.script, "Rebuild completed");
        } else {
            warn!(
                container_id = %job.container_id,
                script = %job.script,
                exit_code = outcome.exit_code,
                "Rebuild failed"
            );
        }
    }

    async fn launch(&self, job: &RebuildJob, local: &Path) -> Outcome {
        let mut child = match self.launcher.command(local).spawn() {
            Ok(child) => child,
            Err(e) => {
                error!(container_id = %job.container_id, error = %e, "Failed to spawn rebuild script");
                return Outcome::failed(String::new(), SPAWN_FAILURE_EXIT_CODE, e.to_string());
            }
        };

        let (tx, mut rx) = mpsc::channel(64);
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump(stdout, StreamKind::Stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump(stderr, StreamKind::Stderr, tx.clone()));
        }
        drop(tx);

        let mut sink = OutputSink::new(self, job);
        let completion = async {
            while let Some((kind, chunk)) = rx.recv().await {
                sink.accept(kind, &chunk);
            }
            child.wait().await
        };

        let status = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, completion).await.ok(),
            None => Some(completion.await),
        };

        if status.is_none() {
            if let Err(e) = child.kill().await {
                warn!(container_id = %job.container_id, error = %e, "Failed to kill timed out script");
            }
            // Output written before the kill may still be queued.
            sink.drain(&mut rx, DRAIN_GRACE).await;
        }
        let output = sink.finish();

        match status {
            Some(Ok(status)) => Outcome {
                output,
                exit_code: status.code().unwrap_or(SPAWN_FAILURE_EXIT_CODE),
                error: None,
            },
            Some(Err(e)) => Outcome::failed(output, SPAWN_FAILURE_EXIT_CODE, e.to_string()),
            None => {
                let limit = self.timeout.unwrap_or_default();
                Outcome::failed(
                    output,
                    TIMEOUT_EXIT_CODE,
                    format!("rebuild timed out after {limit:?}"),
                )
            }
        }
    }
}

type Chunk = (StreamKind, Vec<u8>);

/// Accumulates a job's output and broadcasts each decoded piece.
struct OutputSink<'a> {
    orchestrator: &'a RebuildOrchestrator,
    job: &'a RebuildJob,
    output: String,
    stdout: Utf8Carry,
    stderr: Utf8Carry,
}

impl<'a> OutputSink<'a> {
    fn new(orchestrator: &'a RebuildOrchestrator, job: &'a RebuildJob) -> Self {
        Self {
            orchestrator,
            job,
            output: String::new(),
            stdout: Utf8Carry::new(),
            stderr: Utf8Carry::new(),
        }
    }

    fn accept(&mut self, kind: StreamKind, chunk: &[u8]) {
        let text = match kind {
            StreamKind::Stdout => self.stdout.push(chunk),
            StreamKind::Stderr => self.stderr.push(chunk),
        };
        self.emit(kind, text);
    }

    /// Take whatever is still queued, waiting at most `grace` for the pipes
    /// to close.
    async fn drain(&mut self, rx: &mut mpsc::Receiver<Chunk>, grace: Duration) {
        let _ = tokio::time::timeout(grace, async {
            while let Some((kind, chunk)) = rx.recv().await {
                self.accept(kind, &chunk);
            }
        })
        .await;
        while let Ok((kind, chunk)) = rx.try_recv() {
            self.accept(kind, &chunk);
        }
    }

    /// Flush held-back bytes and return the accumulated output.
    fn finish(mut self) -> String {
        let stdout = self.stdout.finish();
        self.emit(StreamKind::Stdout, stdout);
        let stderr = self.stderr.finish();
        self.emit(StreamKind::Stderr, stderr);
        self.output
    }

    fn emit(&mut self, kind: StreamKind, text: String) {
        if text.is_empty() {
            return;
        }
        self.output.push_str(&text);
        self.orchestrator
            .bus
            .publish(ServerEvent::ScriptOutput(ScriptOutputPayload {
                container_id: self.job.container_id.clone(),
                container_name: self.job.container_name.clone(),
                data: text,
                kind,
            }));
    }
}

/// Forward one pipe's reads until EOF.
async fn pump<R>(mut reader: R, kind: StreamKind, tx: mpsc::Sender<Chunk>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; READ_BUFFER];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send((kind, buf[..n].to_vec())).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(stream = kind.as_str(), error = %e, "Failed to read script output");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tempfile::TempDir;
    use tokio::sync::broadcast;

    use super::*;

    struct Fixture {
        temp: TempDir,
        bus: EventBus,
        orchestrator: RebuildOrchestrator,
    }

    fn fixture(timeout: Option<Duration>) -> Fixture {
        fixture_with_shell(timeout, "bash")
    }

    fn fixture_with_shell(timeout: Option<Duration>, shell: &str) -> Fixture {
        let temp = TempDir::new().unwrap();
        let bus = EventBus::new();
        let launcher = HostLauncher {
            mode: LaunchMode::Direct,
            scripts_dir: temp.path().to_path_buf(),
            host_scripts_dir: PathBuf::from("/unused"),
            host_user: "nobody".to_string(),
            shell: shell.to_string(),
        };
        let orchestrator = RebuildOrchestrator::new(
            RebuildRegistry::new(),
            bus.clone(),
            ScriptDir::new(temp.path()),
            launcher,
            timeout,
        );
        Fixture {
            temp,
            bus,
            orchestrator,
        }
    }

    fn write_script(f: &Fixture, name: &str, body: &str) {
        std::fs::write(f.temp.path().join(name), body).unwrap();
    }

    fn request(script: &str, id: &str) -> RebuildRequest {
        RebuildRequest {
            script_name: Some(script.to_string()),
            container_name: Some("api".to_string()),
            container_id: Some(id.to_string()),
        }
    }

    /// Collect events for `container_id` until its completion.
    async fn until_completed(
        rx: &mut broadcast::Receiver<ServerEvent>,
    ) -> (Vec<ServerEvent>, ScriptCompletedPayload) {
        let mut seen = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(10), rx.recv())
                .await
                .expect("timed out waiting for completion")
                .unwrap();
            if let ServerEvent::ScriptCompleted(done) = &event {
                return (seen, done.clone());
            }
            seen.push(event);
        }
    }

    #[tokio::test]
    async fn test_validation_before_side_effects() {
        let f = fixture(None);
        let mut rx = f.bus.subscribe();

        let missing_script = RebuildRequest {
            container_id: Some("c1".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            f.orchestrator.execute(missing_script).await,
            Err(RebuildError::MissingField("scriptName"))
        ));

        let missing_id = RebuildRequest {
            script_name: Some("UP_api.sh".to_string()),
            container_id: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            f.orchestrator.execute(missing_id).await,
            Err(RebuildError::MissingField("containerId"))
        ));

        assert!(matches!(
            f.orchestrator.execute(request("../UP_api.sh", "c1")).await,
            Err(RebuildError::InvalidScriptName(_))
        ));
        assert!(matches!(
            f.orchestrator.execute(request("UP_api.sh", "c1")).await,
            Err(RebuildError::ScriptNotFound(_))
        ));

        assert!(rx.try_recv().is_err());
        assert!(f.orchestrator.registry().jobs().await.is_empty());
    }

    #[tokio::test]
    async fn test_successful_rebuild_event_sequence() {
        let f = fixture(None);
        write_script(&f, "UP_api.sh", "echo building\necho warn >&2\nexit 0\n");
        let mut rx = f.bus.subscribe();

        let job = f.orchestrator.execute(request("UP_api.sh", "c1")).await.unwrap();
        assert_eq!(job.container_name, "api");

        let (seen, done) = until_completed(&mut rx).await;

        match &seen[0] {
            ServerEvent::RebuildStatusChanged(p) => assert!(p.rebuilding),
            other => panic!("unexpected first event {other:?}"),
        }
        match seen.last().unwrap() {
            ServerEvent::RebuildStatusChanged(p) => {
                assert!(!p.rebuilding);
                assert_eq!(p.success, Some(true));
            }
            other => panic!("unexpected last event {other:?}"),
        }
        let streamed: String = seen
            .iter()
            .filter_map(|e| match e {
                ServerEvent::ScriptOutput(p) => Some(p.data.as_str()),
                _ => None,
            })
            .collect();
        assert!(streamed.contains("building\n"));
        assert!(streamed.contains("warn\n"));

        assert_eq!(done.exit_code, 0);
        assert!(done.success);
        assert!(done.error.is_none());
        assert_eq!(done.output.len(), streamed.len());
        assert!(!f.orchestrator.registry().is_running("c1").await);
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_failure() {
        let f = fixture(None);
        write_script(&f, "UP_api.sh", "echo broken\nexit 3\n");
        let mut rx = f.bus.subscribe();

        f.orchestrator.execute(request("UP_api.sh", "c1")).await.unwrap();
        let (_, done) = until_completed(&mut rx).await;
        assert_eq!(done.exit_code, 3);
        assert!(!done.success);
        assert_eq!(done.output, "broken\n");
    }

    #[tokio::test]
    async fn test_second_execute_is_rejected_while_running() {
        let f = fixture(None);
        write_script(&f, "UP_api.sh", "sleep 1\n");
        let mut rx = f.bus.subscribe();

        f.orchestrator.execute(request("UP_api.sh", "c1")).await.unwrap();
        let second = f.orchestrator.execute(request("UP_api.sh", "c1")).await;
        assert!(matches!(second, Err(RebuildError::AlreadyRunning { .. })));
        assert_eq!(f.orchestrator.registry().jobs().await.len(), 1);

        let (_, done) = until_completed(&mut rx).await;
        assert!(done.success);

        // The slot is free again.
        f.orchestrator.execute(request("UP_api.sh", "c1")).await.unwrap();
        until_completed(&mut rx).await;
    }

    #[tokio::test]
    async fn test_timeout_kills_script() {
        let f = fixture(Some(Duration::from_millis(200)));
        write_script(&f, "UP_api.sh", "echo started\nexec sleep 30\n");
        let mut rx = f.bus.subscribe();

        f.orchestrator.execute(request("UP_api.sh", "c1")).await.unwrap();
        let (seen, done) = until_completed(&mut rx).await;
        assert_eq!(done.exit_code, TIMEOUT_EXIT_CODE);
        assert!(!done.success);
        assert!(done.error.as_deref().unwrap().contains("timed out"));
        assert!(done.output.starts_with("started\n"));
        assert!(done.output.ends_with("\nError: rebuild timed out after 200ms"));
        assert!(matches!(
            seen.last(),
            Some(ServerEvent::RebuildStatusChanged(p)) if p.success == Some(false)
        ));
    }

    #[tokio::test]
    async fn test_spawn_failure_uses_completed_shape() {
        let f = fixture_with_shell(None, "/nonexistent/fleetdeck-shell");
        write_script(&f, "UP_api.sh", "exit 0\n");
        let mut rx = f.bus.subscribe();

        f.orchestrator.execute(request("UP_api.sh", "c1")).await.unwrap();
        let (seen, done) = until_completed(&mut rx).await;

        assert_eq!(done.exit_code, SPAWN_FAILURE_EXIT_CODE);
        assert!(!done.success);
        let message = done.error.clone().expect("spawn error is reported");
        assert_eq!(done.output, format!("\nError: {message}"));

        match seen.last() {
            Some(ServerEvent::RebuildStatusChanged(p)) => {
                assert!(!p.rebuilding);
                assert_eq!(p.success, Some(false));
                assert_eq!(p.error.as_deref(), Some(message.as_str()));
            }
            other => panic!("unexpected last event {other:?}"),
        }
        assert!(!seen.iter().any(|e| matches!(e, ServerEvent::ScriptOutput(_))));
        assert!(!f.orchestrator.registry().is_running("c1").await);
    }

    #[tokio::test]
    async fn test_queued_output_is_drained_and_flushed() {
        let f = fixture(None);
        let mut events = f.bus.subscribe();
        let job = RebuildJob {
            container_id: "c1".to_string(),
            container_name: "api".to_string(),
            script: "UP_api.sh".to_string(),
            started_at: Utc::now(),
        };

        let (tx, mut rx) = mpsc::channel(8);
        tx.send((StreamKind::Stdout, b"last words ".to_vec())).await.unwrap();
        tx.send((StreamKind::Stdout, vec![0xE2, 0x82])).await.unwrap();
        tx.send((StreamKind::Stderr, b"oops\n".to_vec())).await.unwrap();
        tx.send((StreamKind::Stdout, vec![0xAC])).await.unwrap();
        drop(tx);

        let mut sink = OutputSink::new(&f.orchestrator, &job);
        sink.drain(&mut rx, Duration::from_secs(1)).await;
        let output = sink.finish();
        assert_eq!(output, "last words oops\n\u{20AC}");

        let mut streamed = String::new();
        while let Ok(event) = events.try_recv() {
            if let ServerEvent::ScriptOutput(p) = event {
                streamed.push_str(&p.data);
            }
        }
        assert_eq!(streamed, output);
    }
}
