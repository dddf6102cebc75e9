//! Progress reporting infrastructure

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::borrow::Cow;

/// CLI progress report of ongoing operations
///
/// To avoid corrupted terminal output, you should not write anything to stdout
/// or stderr yourself as long as a progress bar is being displayed. Please use
/// logs for debug messages.
#[derive(Clone, Debug, Default)]
pub struct ProgressReport(MultiProgress);
//
impl ProgressReport {
    /// Prepare to report progress on the cli
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepare to report on a new asynchronous operation
    pub fn add(
        &self,
        what: impl Into<Cow<'static, str>>,
        config: ProgressConfig,
    ) -> ProgressTracker {
        let ProgressConfig {
            work,
            show_rate_eta,
        } = config;
        let bar = match work.total() {
            Some(len) => ProgressBar::new(len),
            None => ProgressBar::new_spinner(),
        }
        .with_prefix(what.into());
        let template = match (work, show_rate_eta) {
            (Work::Steps(_), false) => "{prefix} {wide_bar} {pos}/{len}",
            (Work::Steps(_), true) => "{prefix} {wide_bar} {pos}/{len} ({per_sec})",
            (Work::Bytes(_), false) => "{prefix} {wide_bar} {decimal_bytes}/{decimal_total_bytes}",
            (Work::Bytes(_), true) => {
                "{prefix} {wide_bar} {decimal_bytes}/{decimal_total_bytes} ({decimal_bytes_per_sec})"
            }
            (Work::UnknownBytes, false) => "{prefix} {spinner} {decimal_bytes}",
            (Work::UnknownBytes, true) => "{prefix} {spinner} {decimal_bytes} ({decimal_bytes_per_sec})",
        };
        let bar = bar.with_style(
            ProgressStyle::with_template(template)
                .expect("all styles above should be valid indicatif styles"),
        );
        if work.total() != Some(0) {
            self.0.add(bar.clone());
        }
        ProgressTracker {
            bar,
            report: self.0.clone(),
        }
    }
}

/// Progress bar configuration
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub struct ProgressConfig {
    /// Amount of work to be done
    work: Work,

    /// Show the completion rate
    show_rate_eta: bool,
}
//
impl ProgressConfig {
    /// Default configuration, with some amount of work
    pub fn new(work: Work) -> Self {
        Self {
            work,
            show_rate_eta: true,
        }
    }

    /// Disable display of the completion rate
    pub fn dont_show_rate_eta(self) -> Self {
        Self {
            show_rate_eta: false,
            ..self
        }
    }
}

/// Work whose progression can be tracked
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum Work {
    /// Steps to be taken, with a precise count display
    Steps(usize),

    /// Bytes to be processed
    Bytes(u64),

    /// Bytes to be processed, but the total is not known in advance (e.g. a
    /// download from a server that does not advertise content lengths)
    UnknownBytes,
}
//
impl Work {
    /// Total amount of work, if known
    pub fn total(self) -> Option<u64> {
        match self {
            Self::Steps(steps) => Some(steps as u64),
            Self::Bytes(bytes) => Some(bytes),
            Self::UnknownBytes => None,
        }
    }
}

/// Mechanism to track progress
///
/// The progress bar goes away once all the work is done, or once the tracker
/// is dropped, whichever comes first. The latter takes care of operations
/// which fail midway or whose amount of work is unknown.
#[derive(Debug)]
pub struct ProgressTracker {
    /// Progress bar for this specific process
    bar: ProgressBar,

    /// Underlying process report
    report: MultiProgress,
}
//
impl ProgressTracker {
    /// Show that a certain amount of progress has been made
    ///
    /// Returns truth that the progress bar has reached its maximum value, in
    /// which case it is hidden.
    pub fn make_progress(&self, progress: u64) -> bool {
        self.bar.inc(progress);
        let finished = self
            .bar
            .length()
            .is_some_and(|len| self.bar.position() >= len);
        if finished {
            self.hide();
        }
        finished
    }

    /// Hide the progress bar
    fn hide(&self) {
        if !self.bar.is_finished() {
            self.bar.finish_and_clear();
            self.report.remove(&self.bar);
        }
    }
}
//
impl Drop for ProgressTracker {
    fn drop(&mut self) {
        self.hide();
    }
}
