//! Keyboard shortcuts in watch mode: one letter per line on stdin.

use bento_build::SessionController;
use owo_colors::OwoColorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    Restart,
    Clear,
    Quit,
    Help,
}

impl Shortcut {
    const ALL: [Shortcut; 4] = [Shortcut::Restart, Shortcut::Clear, Shortcut::Quit, Shortcut::Help];

    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "r" => Some(Shortcut::Restart),
            "c" => Some(Shortcut::Clear),
            "q" => Some(Shortcut::Quit),
            "h" => Some(Shortcut::Help),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Shortcut::Restart => "r",
            Shortcut::Clear => "c",
            Shortcut::Quit => "q",
            Shortcut::Help => "h",
        }
    }

    fn description(self) -> &'static str {
        match self {
            Shortcut::Restart => "restart the build",
            Shortcut::Clear => "clear the screen",
            Shortcut::Quit => "quit",
            Shortcut::Help => "show this help",
        }
    }
}

pub fn help(color: bool) -> String {
    let mut lines = vec!["Shortcuts".to_string()];
    for shortcut in Shortcut::ALL {
        let key = format!("{} + enter", shortcut.key());
        let key = if color { key.bold().to_string() } else { key };
        lines.push(format!("  press {key} to {}", shortcut.description()));
    }
    lines.join("\n")
}

/// Read shortcuts from stdin until it closes or the task is aborted.
///
/// Nothing is read when stdout is not a terminal.
pub fn spawn(controller: SessionController, color: bool) -> Option<JoinHandle<()>> {
    if !console::user_attended() {
        return None;
    }
    Some(tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            match Shortcut::parse(&line) {
                Some(Shortcut::Restart) => {
                    tracing::info!(target: "bento", "Restarting build...");
                    controller.restart();
                }
                Some(Shortcut::Clear) => {
                    if let Err(e) = console::Term::stdout().clear_screen() {
                        tracing::debug!("failed to clear the screen: {e}");
                    }
                }
                Some(Shortcut::Quit) => {
                    controller.quit();
                    return;
                }
                Some(Shortcut::Help) => tracing::info!(target: "bento", "{}", help(color)),
                None => {}
            }
        }
    }))
}
