#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal helpers for the wildfire map tools.
//!
//! [`init_logger`] wraps `pretty_env_logger` in `indicatif-log-bridge` so
//! log lines don't tear progress bars, and [`IndicatifProgress`] renders
//! [`ProgressCallback`] updates as bars.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use wildfire_map_source::progress::ProgressCallback;

pub use indicatif::MultiProgress;

/// An `indicatif` [`ProgressBar`] behind [`ProgressCallback`].
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Style to switch to once `set_total()` gives a length.
    bar_style: ProgressStyle,
}

impl IndicatifProgress {
    /// Bar for a walk with a known number of steps (registry years).
    #[must_use]
    pub fn steps_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        Arc::new(Self::spinning(
            multi,
            message,
            "{spinner:.green} {msg}",
            "{msg} {wide_bar:.green/dim} {pos}/{len} [{elapsed_precise}]",
        ))
    }

    /// Bar for rate-limited batches (geocoding), with percentage and ETA.
    #[must_use]
    pub fn batch_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        Arc::new(Self::spinning(
            multi,
            message,
            "{spinner:.yellow} {msg}",
            "  {msg} {wide_bar:.yellow/dim} {pos}/{len} {percent}% [{eta}]",
        ))
    }

    /// Spins under `spinner` until a total arrives, then draws `bar`.
    fn spinning(multi: &MultiProgress, message: &str, spinner: &str, bar: &str) -> Self {
        let progress = multi.add(ProgressBar::new_spinner());
        progress.enable_steady_tick(Duration::from_millis(100));
        progress.set_style(
            ProgressStyle::with_template(spinner)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        progress.set_message(message.to_owned());

        Self {
            bar: progress,
            bar_style: ProgressStyle::with_template(bar)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        }
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.bar_style.clone());
    }

    fn set_position(&self, pos: u64) {
        self.bar.set_position(pos);
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Installs the global logger behind `indicatif-log-bridge`. Defaults to
/// `info` when `RUST_LOG` is unset.
///
/// Returns the [`MultiProgress`] all progress bars must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let mut builder = pretty_env_logger::formatted_builder();
    if std::env::var_os("RUST_LOG").is_some() {
        builder.parse_env("RUST_LOG");
    } else {
        builder.filter_level(log::LevelFilter::Info);
    }
    let logger = builder.build();
    let level = logger.filter();

    // Fails only if a logger is already installed (e.g., in tests).
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}
