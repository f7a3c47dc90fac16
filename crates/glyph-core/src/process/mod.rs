//! Supervision of one external interpreter invocation.
//!
//! [`run`] spawns the program with piped stdio, feeds stdin while
//! collecting both output streams, and enforces a wall-clock limit. It is a
//! single `async fn` returning a single [`RunOutcome`], so every invocation
//! resolves exactly once. Each child leads its own process group, and the
//! group is killed when the invocation ends or its future is dropped.

pub mod temp;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

pub use temp::TempProgram;

/// Time a child gets to exit after SIGTERM before it is killed.
const TERM_GRACE: Duration = Duration::from_millis(200);

/// Everything needed to launch one interpreter run.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Added to the inherited environment.
    pub env: BTreeMap<String, String>,
    /// Written to the child's stdin, which is then closed. `None` gives the
    /// child a null stdin.
    pub stdin: Option<String>,
    pub timeout: Duration,
}

impl ProcessSpec {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            stdin: None,
            timeout,
        }
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn envs(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn stdin(mut self, text: impl Into<String>) -> Self {
        self.stdin = Some(text.into());
        self
    }
}

/// How an invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The process exited on its own. `exit_code` is `None` when it was
    /// ended by a signal.
    Exited {
        exit_code: Option<i32>,
        stdout: String,
        stderr: String,
    },
    /// The limit elapsed; the child was terminated and its output dropped.
    TimedOut,
    /// The process could not be started.
    SpawnFailed(String),
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(self, RunOutcome::Exited { exit_code: Some(0), .. })
    }
}

/// Run a process to completion or until its timeout.
///
/// The child leads its own process group. Whatever it forked is killed
/// with it, both on timeout and after a clean exit, so no descendant
/// outlives the invocation or holds the output pipes open.
pub async fn run(spec: &ProcessSpec) -> RunOutcome {
    let start = Instant::now();
    let mut command = Command::new(&spec.program);
    command
        .args(&spec.args)
        .envs(&spec.env)
        .stdin(if spec.stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            debug!(program = %spec.program.display(), error = %e, "spawn failed");
            return RunOutcome::SpawnFailed(e.to_string());
        }
    };
    let mut group = ProcessGroup::new(child.id());
    debug!(
        program = %spec.program.display(),
        args = ?spec.args,
        pid = child.id(),
        "spawned interpreter"
    );

    // Take the pipes so they can be driven concurrently with waiting for
    // the process. This avoids deadlocks if the child fills a pipe buffer.
    let stdin_pipe = child.stdin.take();
    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();

    let write_stdin = async {
        if let (Some(mut pipe), Some(text)) = (stdin_pipe, spec.stdin.as_deref()) {
            if let Err(e) = pipe.write_all(text.as_bytes()).await {
                debug!(error = %e, "failed to write interpreter stdin");
            }
            // Dropping the pipe closes the child's stdin.
        }
    };

    let read_stdout = async {
        let mut buf = Vec::new();
        if let Some(ref mut pipe) = stdout_pipe {
            pipe.read_to_end(&mut buf).await.ok();
        }
        String::from_utf8_lossy(&buf).into_owned()
    };

    let read_stderr = async {
        let mut buf = Vec::new();
        if let Some(ref mut pipe) = stderr_pipe {
            pipe.read_to_end(&mut buf).await.ok();
        }
        String::from_utf8_lossy(&buf).into_owned()
    };

    let wait_and_reap = async {
        let status = child.wait().await;
        // Background descendants would otherwise keep the pipes open.
        group.kill();
        status
    };

    let waited = tokio::time::timeout(spec.timeout, async {
        let ((), wait_result, stdout, stderr) =
            tokio::join!(write_stdin, wait_and_reap, read_stdout, read_stderr);
        (wait_result, stdout, stderr)
    })
    .await;

    let outcome = match waited {
        Ok((Ok(status), stdout, stderr)) => {
            debug!(
                exit_code = status.code(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "interpreter exited"
            );
            RunOutcome::Exited {
                exit_code: status.code(),
                stdout,
                stderr,
            }
        }
        Ok((Err(e), _, _)) => RunOutcome::SpawnFailed(e.to_string()),
        Err(_) => {
            warn!(
                program = %spec.program.display(),
                timeout_ms = spec.timeout.as_millis() as u64,
                "interpreter timed out"
            );
            terminate(&mut child, &group).await;
            RunOutcome::TimedOut
        }
    };
    group.disarm();
    outcome
}

/// SIGTERM to the group, a short grace period, then SIGKILL.
async fn terminate(child: &mut Child, group: &ProcessGroup) {
    if group.signal_term() {
        if let Ok(Ok(_)) = tokio::time::timeout(TERM_GRACE, child.wait()).await {
            debug!(pid = group.leader(), "process exited after SIGTERM");
        }
    } else {
        warn!(pid = group.leader(), "SIGTERM failed, proceeding to SIGKILL");
    }
    group.kill();
    // The leader may have ignored SIGTERM; make sure it is reaped.
    if let Err(e) = child.kill().await {
        debug!(error = %e, "kill after timeout failed");
    }
}

/// The process group led by a spawned child.
///
/// Until disarmed, dropping it kills the whole group, so an invocation
/// future that is abandoned mid-flight takes its descendants with it.
#[derive(Debug)]
struct ProcessGroup {
    leader: Option<u32>,
}

impl ProcessGroup {
    fn new(leader: Option<u32>) -> Self {
        Self { leader }
    }

    fn leader(&self) -> Option<u32> {
        self.leader
    }

    /// Send SIGTERM to every member. Returns whether the signal was
    /// delivered.
    fn signal_term(&self) -> bool {
        #[cfg(unix)]
        {
            self.signal(libc::SIGTERM)
        }
        #[cfg(not(unix))]
        {
            false
        }
    }

    /// SIGKILL every remaining member. A group that is already empty is
    /// not an error.
    fn kill(&self) {
        #[cfg(unix)]
        {
            self.signal(libc::SIGKILL);
        }
    }

    #[cfg(unix)]
    fn signal(&self, signal: libc::c_int) -> bool {
        let Some(pid) = self.leader else {
            return false;
        };
        // SAFETY: a negative pid addresses the process group created for
        // this child by `process_group(0)`; the group id is the leader's pid.
        unsafe { libc::kill(-(pid as libc::pid_t), signal) == 0 }
    }

    fn disarm(&mut self) {
        self.leader = None;
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str, timeout: Duration) -> ProcessSpec {
        ProcessSpec::new("sh", timeout).args(["-c", script])
    }

    #[tokio::test]
    async fn captures_exit_code_and_both_streams() {
        let outcome = run(&sh("echo out; echo err >&2; exit 3", Duration::from_secs(5))).await;
        assert_eq!(
            outcome,
            RunOutcome::Exited {
                exit_code: Some(3),
                stdout: "out\n".into(),
                stderr: "err\n".into(),
            }
        );
        assert!(!outcome.succeeded());
    }

    #[tokio::test]
    async fn stdin_is_written_then_closed() {
        let spec = ProcessSpec::new("cat", Duration::from_secs(5)).stdin("⍳5\n");
        let outcome = run(&spec).await;
        assert!(outcome.succeeded());
        let RunOutcome::Exited { stdout, .. } = outcome else {
            panic!("expected exit");
        };
        assert_eq!(stdout, "⍳5\n");
    }

    #[tokio::test]
    async fn missing_stdin_reads_as_empty() {
        let outcome = run(&ProcessSpec::new("cat", Duration::from_secs(5))).await;
        assert_eq!(
            outcome,
            RunOutcome::Exited {
                exit_code: Some(0),
                stdout: String::new(),
                stderr: String::new(),
            }
        );
    }

    #[tokio::test]
    async fn environment_is_added() {
        let env = BTreeMap::from([("GLYPH_TEST_VALUE".to_owned(), "dumb".to_owned())]);
        let spec = sh("printf %s \"$GLYPH_TEST_VALUE\"", Duration::from_secs(5)).envs(&env);
        let RunOutcome::Exited { stdout, .. } = run(&spec).await else {
            panic!("expected exit");
        };
        assert_eq!(stdout, "dumb");
    }

    #[tokio::test]
    async fn timeout_terminates_the_child() {
        let start = Instant::now();
        let outcome = run(&sh("exec sleep 30", Duration::from_millis(300))).await;
        assert_eq!(outcome, RunOutcome::TimedOut);
        assert!(
            start.elapsed() < Duration::from_secs(5),
            "timeout took {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn background_descendants_do_not_delay_a_clean_exit() {
        let start = Instant::now();
        let outcome = run(&sh("echo ok; sleep 5 & exit 0", Duration::from_secs(3))).await;
        assert_eq!(
            outcome,
            RunOutcome::Exited {
                exit_code: Some(0),
                stdout: "ok\n".into(),
                stderr: String::new(),
            }
        );
        assert!(start.elapsed() < Duration::from_secs(2), "took {:?}", start.elapsed());
    }

    /// A pid counts as gone once it is reaped or left as a zombie.
    #[cfg(target_os = "linux")]
    fn running(pid: u32) -> bool {
        match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
            Ok(stat) => stat
                .rsplit_once(')')
                .and_then(|(_, rest)| rest.split_whitespace().next())
                .is_some_and(|state| state != "Z" && state != "X"),
            Err(_) => false,
        }
    }

    #[cfg(target_os = "linux")]
    async fn wait_until_gone(pid: u32) -> bool {
        for _ in 0..40 {
            if !running(pid) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn timeout_kills_forked_descendants() {
        let dir = tempfile::TempDir::new().unwrap();
        let pidfile = dir.path().join("grandchild.pid");
        let script = format!(
            "sh -c 'echo $$ > \"{}\"; exec sleep 37'; true",
            pidfile.display()
        );
        let outcome = run(&sh(&script, Duration::from_millis(500))).await;
        assert_eq!(outcome, RunOutcome::TimedOut);

        let pid: u32 = std::fs::read_to_string(&pidfile)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        assert!(wait_until_gone(pid).await, "grandchild {pid} survived the timeout");
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn clean_exit_kills_background_descendants() {
        let dir = tempfile::TempDir::new().unwrap();
        let pidfile = dir.path().join("background.pid");
        let script = format!(
            "sh -c 'echo $$ > \"{}\"; exec sleep 37' >/dev/null 2>&1 & sleep 0.2; echo done",
            pidfile.display()
        );
        let outcome = run(&sh(&script, Duration::from_secs(5))).await;
        assert!(outcome.succeeded(), "got {outcome:?}");

        let pid: u32 = std::fs::read_to_string(&pidfile)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        assert!(wait_until_gone(pid).await, "background process {pid} outlived its parent");
    }

    #[tokio::test]
    async fn missing_program_is_a_spawn_failure() {
        let spec = ProcessSpec::new("/nonexistent/glyph-interpreter", Duration::from_secs(1));
        assert!(matches!(run(&spec).await, RunOutcome::SpawnFailed(_)));
    }
}
