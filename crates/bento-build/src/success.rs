//! The command run after every successful build.
//!
//! A newer build aborts the command still running from the previous one.
//! Shell commands are spawned in their own process group so aborting takes
//! down everything they started.

use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use bento_config::ResolvedConfig;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::process::{Child, Command};
use tokio::sync::oneshot;

use crate::error::{BuildError, Result};

/// Fires when the callback's build has been superseded.
pub struct AbortSignal(oneshot::Receiver<()>);

impl AbortSignal {
    /// Resolve once aborted. An abort handle that went away counts as an abort.
    pub async fn aborted(self) {
        let _ = self.0.await;
    }
}

/// Programmatic replacement for the `onSuccess` shell command.
pub type SuccessCallback =
    Arc<dyn Fn(ResolvedConfig, AbortSignal) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Abort handle for the success command of one config.
#[derive(Debug, Clone, Default)]
pub struct SuccessAbort {
    sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl SuccessAbort {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort the running command, if any.
    pub fn abort(&self) {
        if let Some(sender) = self.sender.lock().take() {
            let _ = sender.send(());
        }
    }

    pub fn is_armed(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Start a new run, aborting the previous one.
    fn arm(&self) -> oneshot::Receiver<()> {
        let (sender, receiver) = oneshot::channel();
        if let Some(previous) = self.sender.lock().replace(sender) {
            let _ = previous.send(());
        }
        receiver
    }
}

/// Run the success command (or callback) of `config`, waiting until it exits or
/// is aborted through `abort`.
///
/// Only the first format of a fan-out has a command. A non-zero exit code is
/// recorded on the run context instead of failing the build.
pub async fn run_on_success(
    config: &ResolvedConfig,
    callback: Option<&SuccessCallback>,
    abort: &SuccessAbort,
) -> Result<()> {
    let Some(run_once) = config.run_once() else {
        return Ok(());
    };

    if let Some(command) = &run_once.on_success {
        let aborted = abort.arm();
        let status = run_shell(config, command, aborted).await?;
        if let Some(code) = status.and_then(|status| status.code()).filter(|code| *code != 0) {
            tracing::debug!("onSuccess exited with code {code}");
            config.logger.context().set_exit_code(code);
        }
    } else if let Some(callback) = callback {
        let signal = AbortSignal(abort.arm());
        callback(config.clone(), signal)
            .await
            .map_err(|e| BuildError::PostBuild(format!("onSuccess failed: {e}")))?;
    }
    Ok(())
}

/// Returns `None` when the command was aborted.
async fn run_shell(
    config: &ResolvedConfig,
    command: &str,
    aborted: oneshot::Receiver<()>,
) -> Result<Option<ExitStatus>> {
    tracing::debug!("Running onSuccess: {command}");
    let mut child = shell(command)
        .current_dir(&config.cwd)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| BuildError::io(&config.cwd, e))?;

    tokio::select! {
        status = child.wait() => {
            let status = status.map_err(|e| BuildError::io(&config.cwd, e))?;
            Ok(Some(status))
        }
        _ = aborted => {
            tracing::debug!("Aborting onSuccess: {command}");
            kill_tree(&mut child).await;
            Ok(None)
        }
    }
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command).process_group(0);
    cmd
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

/// Kill `child` together with everything it spawned.
async fn kill_tree(child: &mut Child) {
    if let Some(pid) = child.id() {
        #[cfg(unix)]
        let killed = Command::new("kill")
            .arg("-TERM")
            .arg(format!("-{pid}"))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;
        #[cfg(windows)]
        let killed = Command::new("taskkill")
            .args(["/T", "/F", "/PID", &pid.to_string()])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        if killed.is_ok_and(|status| status.success()) {
            let _ = child.wait().await;
            return;
        }
    }
    let _ = child.kill().await;
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::{Duration, Instant};

    use bento_config::RunOnceOptions;
    use bento_config::test_utils::{plan, with_run_once};
    use futures::FutureExt;
    use tempfile::TempDir;

    use super::*;

    fn with_command(dir: &TempDir, command: &str) -> ResolvedConfig {
        with_run_once(
            plan(dir.path()),
            RunOnceOptions {
                copy: None,
                on_success: Some(command.to_string()),
            },
        )
    }

    #[tokio::test]
    async fn runs_in_cwd_and_records_exit_code() {
        let dir = TempDir::new().expect("tempdir");
        let config = with_command(&dir, "touch marker && exit 3");

        run_on_success(&config, None, &SuccessAbort::new())
            .await
            .expect("command ran");
        assert!(dir.path().join("marker").exists());
        assert_eq!(config.logger.context().exit_code(), 3);
    }

    #[tokio::test]
    async fn abort_kills_the_running_command() {
        let dir = TempDir::new().expect("tempdir");
        let config = with_command(&dir, "sleep 10; touch late");
        let abort = SuccessAbort::new();

        let started = Instant::now();
        let run = {
            let (config, abort) = (config.clone(), abort.clone());
            tokio::spawn(async move { run_on_success(&config, None, &abort).await })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;
        abort.abort();

        run.await.expect("task").expect("aborted cleanly");
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(!dir.path().join("late").exists());
        assert_eq!(config.logger.context().exit_code(), 0);
    }

    #[tokio::test]
    async fn later_formats_do_not_run_the_command() {
        let dir = TempDir::new().expect("tempdir");
        let mut config = with_command(&dir, "touch marker");
        config.fanout_index = 1;

        run_on_success(&config, None, &SuccessAbort::new())
            .await
            .expect("nothing to run");
        assert!(!dir.path().join("marker").exists());
    }

    #[tokio::test]
    async fn callback_receives_abort_signal() {
        let dir = TempDir::new().expect("tempdir");
        let config = with_run_once(plan(dir.path()), RunOnceOptions::default());
        let abort = SuccessAbort::new();
        let callback: SuccessCallback = Arc::new(|_config: ResolvedConfig, signal: AbortSignal| {
            async move {
                signal.aborted().await;
                Ok(())
            }
            .boxed()
        });

        let run = {
            let (config, abort) = (config.clone(), abort.clone());
            tokio::spawn(async move { run_on_success(&config, Some(&callback), &abort).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(abort.is_armed());
        abort.abort();
        run.await.expect("task").expect("callback returned");
    }
}
