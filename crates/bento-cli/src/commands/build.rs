//! The build command.
//!
//! Each pass resolves the inline config against the config files, builds
//! every resulting config and, in watch mode, waits for a restart or quit
//! request. A restart disposes everything and starts a fresh pass, so config
//! file edits take effect.

use std::sync::Arc;

use bento_build::{BuildSession, Orchestrator, PassthroughBundler, SessionEvent};
use bento_config::{InlineConfig, RunContext};
use owo_colors::OwoColorize;

use crate::cli::BuildArgs;
use crate::config::inline_config;
use crate::error::{CliError, Result};
use crate::shortcuts;

/// Execute the build command.
///
/// Returns [`CliError::Failed`] when the builds ran but something logged an
/// error, or the success command exited with a non-zero code.
pub async fn execute(args: &BuildArgs, color: bool) -> Result<()> {
    let inline = inline_config(args)?;
    let cwd = std::env::current_dir()?;

    let version = format!("v{}", env!("CARGO_PKG_VERSION"));
    let version = if color { version.dimmed().to_string() } else { version };
    tracing::info!(target: "bento", "bento {version}");

    loop {
        let ctx = Arc::new(RunContext::new(&cwd).with_color(color));
        let session = build(&inline, &ctx).await?;

        if !session.is_watching() {
            return finish(&ctx);
        }

        match watch(session, color).await {
            SessionEvent::Restart => continue,
            SessionEvent::Quit => return finish(&ctx),
        }
    }
}

async fn build(inline: &InlineConfig, ctx: &Arc<RunContext>) -> Result<BuildSession> {
    let orchestrator = Orchestrator::new(Arc::new(PassthroughBundler::new()));
    Ok(orchestrator.build(inline, ctx, None).await?)
}

/// Wait for the session to restart or quit, then dispose it.
async fn watch(mut session: BuildSession, color: bool) -> SessionEvent {
    let shortcuts = shortcuts::spawn(session.controller(), color);
    if shortcuts.is_some() {
        let hint = "press h + enter to show help";
        let hint = if color { hint.dimmed().to_string() } else { hint.to_string() };
        tracing::info!(target: "bento", "Watching for changes, {hint}");
    }

    let event = tokio::select! {
        event = session.next_event() => event,
        _ = tokio::signal::ctrl_c() => SessionEvent::Quit,
    };

    if let Some(shortcuts) = shortcuts {
        shortcuts.abort();
    }
    session.dispose().await;
    event
}

fn finish(ctx: &RunContext) -> Result<()> {
    match exit_code(ctx) {
        0 => Ok(()),
        code => Err(CliError::Failed(code)),
    }
}

/// The success command's exit code if it failed, else 1 if anything was
/// logged as an error.
fn exit_code(ctx: &RunContext) -> i32 {
    match ctx.exit_code() {
        0 if ctx.has_errored() => 1,
        code => code,
    }
}
