//! Logging setup for the `bento` command.
//!
//! Build output (the per-config `Logger` of `bento-config`) and internal
//! `tracing` events both go through one `tracing-subscriber` formatter.
//!
//! The filter is chosen in this order:
//! 1. `--verbose`: debug for the bento crates
//! 2. `--quiet`: errors only
//! 3. `RUST_LOG`
//! 4. info for the bento crates

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const VERBOSE: &str = "bento=debug,bento_config=debug,bento_build=debug,bento_cli=debug";
const QUIET: &str = "bento=error,bento_config=error,bento_build=error,bento_cli=error";
const DEFAULT: &str = "bento=info,bento_config=info,bento_build=info,bento_cli=info";

/// Initialize the global subscriber. Call once, before anything logs.
pub fn init_logger(verbose: bool, quiet: bool, no_color: bool) {
    let filter = filter(verbose, quiet);

    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_level(verbose)
        .with_ansi(!no_color)
        .without_time()
        .compact();

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn filter(verbose: bool, quiet: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new(VERBOSE)
    } else if quiet {
        EnvFilter::new(QUIET)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT))
    }
}

/// Whether colored output should be used.
///
/// `NO_COLOR` disables colors and `FORCE_COLOR` forces them; otherwise the
/// terminal decides.
pub fn should_use_colors(no_color: bool) -> bool {
    if no_color || std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::Term::stdout().features().colors_supported()
}

#[cfg(test)]
mod tests {
    use serial_test::serial;
    use tracing_subscriber::filter::LevelFilter;

    use super::*;

    #[test]
    #[serial]
    fn no_color_wins_over_force_color() {
        // SAFETY: env-mutating tests are serialized.
        unsafe {
            std::env::remove_var("NO_COLOR");
            std::env::set_var("FORCE_COLOR", "1");
        }
        assert!(should_use_colors(false));
        assert!(!should_use_colors(true));
        unsafe {
            std::env::remove_var("FORCE_COLOR");
        }
    }

    #[test]
    fn verbosity_flags_pick_the_level() {
        assert_eq!(filter(true, false).max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(filter(false, true).max_level_hint(), Some(LevelFilter::ERROR));
    }
}
