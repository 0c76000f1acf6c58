//! Progress bar for long sync runs.

use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::Arc;
use std::time::Instant;

const BAR_TEMPLATE: &str = "{spinner:.cyan} [{bar:25}] {pos}/{len} {msg}";

#[derive(Debug)]
struct DelayedProgressState {
    start_time: Instant,
    delay: Duration,
    enabled: bool,
    visible: AtomicBool,
    has_content: AtomicBool,
}

/// A progress reporter that stays hidden until a run has been busy for `delay`.
///
/// Short runs (or runs with progress disabled) never draw anything, which keeps CI logs clean.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    bar: ProgressBar,
    state: Arc<DelayedProgressState>,
}

impl ProgressReporter {
    #[must_use]
    pub fn new(delay: Duration, enabled: bool) -> Self {
        let bar = ProgressBar::hidden();
        if let Ok(style) = ProgressStyle::default_bar().template(BAR_TEMPLATE) {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_length(0);
        bar.set_draw_target(ProgressDrawTarget::hidden());

        Self {
            bar,
            state: Arc::new(DelayedProgressState {
                start_time: Instant::now(),
                delay,
                enabled,
                visible: AtomicBool::new(false),
                has_content: AtomicBool::new(false),
            }),
        }
    }

    /// A reporter that never draws.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO, false)
    }

    fn ensure_visible(&self) {
        if self.state.enabled
            && !self.state.visible.load(Ordering::Relaxed)
            && self.state.has_content.load(Ordering::Relaxed)
            && self.state.start_time.elapsed() >= self.state.delay
        {
            self.state.visible.store(true, Ordering::Relaxed);
            self.bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        }
    }

    /// Total units of work. The bar stays hidden until there is some.
    pub fn set_length(&self, len: u64) {
        if len > 0 {
            self.state.has_content.store(true, Ordering::Relaxed);
        }
        self.ensure_visible();
        self.bar.set_length(len);
    }

    pub fn set_position(&self, pos: u64) {
        self.ensure_visible();
        self.bar.set_position(pos);
    }

    pub fn set_message(&self, msg: impl AsRef<str>) {
        let msg = msg.as_ref();
        if !msg.is_empty() {
            self.state.has_content.store(true, Ordering::Relaxed);
        }
        self.ensure_visible();
        self.bar.set_message(msg.to_string());
    }

    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.state.visible.load(Ordering::Relaxed)
    }

    /// Remove the bar from the terminal.
    pub fn finish_and_clear(&self) {
        if self.is_visible() {
            self.bar.finish_and_clear();
        }
    }
}
