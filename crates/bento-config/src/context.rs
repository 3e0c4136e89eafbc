//! Per-invocation state shared by resolution and build.
//!
//! A fresh [`RunContext`] is created at the start of every invocation (and on
//! every watch-mode restart) and passed down explicitly. It owns the caches that
//! would otherwise be process globals: name label colors, the set of warnings
//! already printed, and the "something logged an error" flag that drives the
//! exit code.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

/// Check if running in a CI environment.
///
/// Detects common CI environment variables.
pub fn is_ci() -> bool {
    env::var("CI").is_ok()
        || env::var("CONTINUOUS_INTEGRATION").is_ok()
        || env::var("GITHUB_ACTIONS").is_ok()
        || env::var("GITLAB_CI").is_ok()
        || env::var("CIRCLECI").is_ok()
        || env::var("TRAVIS").is_ok()
        || env::var("BUILDKITE").is_ok()
}

#[derive(Debug)]
pub struct RunContext {
    cwd: PathBuf,
    ci: bool,
    color: bool,
    colors: Mutex<FxHashMap<String, (u8, u8, u8)>>,
    warned: Mutex<FxHashSet<String>>,
    errored: AtomicBool,
    exit_code: AtomicI32,
}

impl RunContext {
    /// Create a context rooted at `cwd`, detecting CI from the environment.
    pub fn new(cwd: impl Into<PathBuf>) -> Self {
        Self {
            cwd: cwd.into(),
            ci: is_ci(),
            color: true,
            colors: Mutex::new(FxHashMap::default()),
            warned: Mutex::new(FxHashSet::default()),
            errored: AtomicBool::new(false),
            exit_code: AtomicI32::new(0),
        }
    }

    /// Override CI detection. Mostly useful in tests.
    pub fn with_ci(mut self, ci: bool) -> Self {
        self.ci = ci;
        self
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    pub fn is_ci(&self) -> bool {
        self.ci
    }

    pub fn color_enabled(&self) -> bool {
        self.color
    }

    /// Record `message` as printed. Returns `false` if it was already recorded.
    pub fn mark_warned(&self, message: &str) -> bool {
        self.warned.lock().insert(message.to_string())
    }

    pub fn was_warned(&self, message: &str) -> bool {
        self.warned.lock().contains(message)
    }

    pub fn set_errored(&self) {
        self.errored.store(true, Ordering::SeqCst);
    }

    pub fn has_errored(&self) -> bool {
        self.errored.load(Ordering::SeqCst)
    }

    /// Exit code requested by a failed success command. Zero means none.
    pub fn set_exit_code(&self, code: i32) {
        self.exit_code.store(code, Ordering::SeqCst);
    }

    pub fn exit_code(&self) -> i32 {
        self.exit_code.load(Ordering::SeqCst)
    }

    /// Stable RGB color for a config name label.
    pub fn label_color(&self, name: &str) -> (u8, u8, u8) {
        let mut colors = self.colors.lock();
        *colors
            .entry(name.to_string())
            .or_insert_with(|| name_color(name))
    }
}

const DEFAULT_LABEL_COLOR: (u8, u8, u8) = (59, 142, 234);

fn name_color(name: &str) -> (u8, u8, u8) {
    if name == "default" {
        return DEFAULT_LABEL_COLOR;
    }
    let mut hash: i32 = 0;
    for unit in name.encode_utf16() {
        hash = i32::from(unit).wrapping_add(hash.wrapping_shl(5).wrapping_sub(hash));
    }
    let hue = f64::from(hash.rem_euclid(360));
    hsl_to_rgb(hue, 35.0, 55.0)
}

fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (u8, u8, u8) {
    let h = (h % 360.0) / 360.0;
    let s = s / 100.0;
    let l = l / 100.0;

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    let channel = |t: f64| (hue_to_rgb(p, q, t) * 255.0).round().clamp(0.0, 255.0) as u8;

    (
        channel(h + 1.0 / 3.0),
        channel(h),
        channel(h - 1.0 / 3.0),
    )
}

fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        return p + (q - p) * 6.0 * t;
    }
    if t < 0.5 {
        return q;
    }
    if t < 2.0 / 3.0 {
        return p + (q - p) * (2.0 / 3.0 - t) * 6.0;
    }
    p
}
