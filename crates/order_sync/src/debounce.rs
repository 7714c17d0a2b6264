use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use crate::timer::TimerHandle;

/// Collapses a burst of search keystrokes into a single committed term.
///
/// Every `on_input` replaces the pending timer, so only the last input of an
/// unbroken burst is ever sent to the commit channel, trimmed.
#[derive(Debug)]
pub struct SearchDebouncer {
    quiet: Duration,
    commits: mpsc::UnboundedSender<String>,
    pending: Option<TimerHandle>,
}

impl SearchDebouncer {
    pub fn new(quiet: Duration) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (commits, rx) = mpsc::unbounded_channel();
        (
            Self {
                quiet,
                commits,
                pending: None,
            },
            rx,
        )
    }

    pub fn quiet_period(&self) -> Duration {
        self.quiet
    }

    pub fn on_input(&mut self, raw: &str) {
        self.cancel();

        let term = raw.trim().to_string();
        let commits = self.commits.clone();
        self.pending = Some(TimerHandle::schedule(self.quiet, async move {
            debug!(search_term = %term, "committing debounced search term");
            if commits.send(term).is_err() {
                debug!("search commit receiver dropped");
            }
        }));
    }

    /// Voids the pending commit, if any. Returns whether one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(timer) => {
                let was_pending = !timer.is_finished();
                timer.cancel();
                was_pending
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }
}

#[cfg(test)]
#[path = "tests/debounce_tests.rs"]
mod tests;
