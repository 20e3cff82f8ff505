//! Progress spinner fed by engine events

use dredge_core::RunEvent;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Spinner counting extracted entries.
///
/// The total is unknown until the run is over, since nested archives
/// keep adding work.
pub struct ProgressReporter {
    bar: Option<ProgressBar>,
}

impl ProgressReporter {
    /// Create a reporter; a disabled one ignores every call
    pub fn new(enabled: bool) -> Self {
        if !enabled {
            return Self { bar: None };
        }

        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] {pos} entries {wide_msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar: Some(bar) }
    }

    /// Handle that can be moved into the engine observer
    pub fn handle(&self) -> Option<ProgressBar> {
        self.bar.clone()
    }

    /// Stop the spinner and leave a summary line
    pub fn finish(&self, message: &str) {
        if let Some(bar) = &self.bar {
            bar.finish_with_message(message.to_string());
        }
    }
}

/// Advance `bar` for one engine event
pub fn observe(bar: &ProgressBar, event: &RunEvent) {
    match event {
        RunEvent::Extracted { path } => {
            bar.inc(1);
            bar.set_message(path.display().to_string());
        }
        RunEvent::NestedArchive { kind, path } => {
            bar.set_message(format!("nested {}: {}", kind, path.display()));
        }
        RunEvent::Skipped { path, .. } => {
            bar.set_message(format!("skipped {}", path.display()));
        }
        RunEvent::MissingSource { .. } => {}
    }
}
