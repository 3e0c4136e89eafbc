//! Per-config logger.
//!
//! Each resolved config carries a [`Logger`] that knows its level, whether
//! warnings are escalated to errors, and the colored `[name]` label printed in
//! front of every line. Output goes through `tracing`; the CLI installs the
//! subscriber.

use std::fmt::Display;
use std::sync::Arc;

use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};

use crate::context::RunContext;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Silent,
    Error,
    Warn,
    #[default]
    Info,
}

#[derive(Debug, Clone)]
pub struct Logger {
    level: LogLevel,
    fail_on_warn: bool,
    label: Option<String>,
    ctx: Arc<RunContext>,
}

impl Logger {
    pub fn new(ctx: Arc<RunContext>, level: LogLevel, fail_on_warn: bool) -> Self {
        Self {
            level,
            fail_on_warn,
            label: None,
            ctx,
        }
    }

    /// Prefix every line with `[name]` in the color assigned to `name`.
    pub fn with_label(mut self, name: Option<&str>) -> Self {
        self.label = name.map(|name| {
            let text = format!("[{name}]");
            if self.ctx.color_enabled() {
                let (r, g, b) = self.ctx.label_color(name);
                text.truecolor(r, g, b).to_string()
            } else {
                text
            }
        });
        self
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn fail_on_warn(&self) -> bool {
        self.fail_on_warn
    }

    pub fn context(&self) -> &Arc<RunContext> {
        &self.ctx
    }

    fn enabled(&self, level: LogLevel) -> bool {
        self.level >= level
    }

    fn line(&self, message: impl Display) -> String {
        match &self.label {
            Some(label) => format!("{label} {message}"),
            None => message.to_string(),
        }
    }

    pub fn info(&self, message: impl Display) {
        if self.enabled(LogLevel::Info) {
            tracing::info!(target: "bento", "{}", self.line(message));
        }
    }

    pub fn success(&self, message: impl Display) {
        if self.enabled(LogLevel::Info) {
            let mark = if self.ctx.color_enabled() {
                "✔".green().to_string()
            } else {
                "✔".to_string()
            };
            tracing::info!(target: "bento", "{mark} {}", self.line(message));
        }
    }

    pub fn warn(&self, message: impl Display) {
        let message = message.to_string();
        if self.fail_on_warn {
            return self.error(message);
        }
        self.ctx.mark_warned(&message);
        if self.enabled(LogLevel::Warn) {
            tracing::warn!(target: "bento", "{}", self.line(message));
        }
    }

    /// Like [`Logger::warn`], but prints a given message at most once per run.
    pub fn warn_once(&self, message: impl Display) {
        let message = message.to_string();
        if self.ctx.was_warned(&message) {
            return;
        }
        if self.fail_on_warn {
            return self.error(message);
        }
        self.ctx.mark_warned(&message);
        if self.enabled(LogLevel::Warn) {
            tracing::warn!(target: "bento", "{}", self.line(message));
        }
    }

    /// Print an error and mark the run as failed.
    pub fn error(&self, message: impl Display) {
        if self.enabled(LogLevel::Error) {
            tracing::error!(target: "bento", "{}", self.line(message));
        }
        self.ctx.set_errored();
    }
}
