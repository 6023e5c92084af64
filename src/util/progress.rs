//! Progress reporting for fan-out stages.
//!
//! Reporters receive `{started, ticked, done}` events and never participate
//! in correctness; a quiet reporter drops everything on the floor. Clones
//! share the underlying bar so rayon workers can tick from any thread.

use std::sync::{Arc, Mutex};

use indicatif::{ProgressBar, ProgressStyle};

#[derive(Clone)]
pub struct Reporter {
    bar: Arc<Mutex<Option<ProgressBar>>>,
    quiet: bool,
}

impl Reporter {
    /// Create a reporter. A quiet reporter emits nothing.
    pub fn new(quiet: bool) -> Self {
        Reporter {
            bar: Arc::new(Mutex::new(None)),
            quiet,
        }
    }

    /// Reporter used in tests and library callers that want no output.
    pub fn silent() -> Self {
        Reporter::new(true)
    }

    /// Start a new phase with a known number of items.
    pub fn start(&self, message: impl Into<String>, total: u64) {
        self.finish();
        if self.quiet || total == 0 {
            return;
        }

        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:30}] {pos}/{len}")
                .expect("static template")
                .progress_chars("=> "),
        );
        bar.set_message(message.into());
        *self.bar.lock().unwrap() = Some(bar);
    }

    /// Report one completed item.
    pub fn tick(&self, item: &str) {
        if let Some(bar) = self.bar.lock().unwrap().as_ref() {
            bar.inc(1);
        }
        tracing::debug!("done: {}", item);
    }

    /// Finish the current phase, if any.
    pub fn finish(&self) {
        if let Some(bar) = self.bar.lock().unwrap().take() {
            bar.finish_and_clear();
        }
    }
}
