//! Source tree watcher.
//!
//! Keeps the output tree in sync with the source tree while serving.
//! Implements the "Watcher-First" pattern: the subscription is created
//! before the initial full build, so edits made during the build are
//! buffered instead of lost.
//!
//! Architecture:
//! ```text
//! notify callback → bounded channel → Debouncer (pure timing)
//!                 → Classifier (filesystem checks) → Builder
//! ```

use std::path::Path;

use crossbeam::channel::{self, Receiver, select};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};

use crate::compiler::{Builder, MarkdownRenderer, Render};
use crate::logger::{status_error, status_success, status_warning};
use crate::{debug, log};

// Filesystem checks (raw changes -> actionable document changes).
mod classifier;
// Pure timing and per-path coalescing.
mod debouncer;
// Shared change types.
mod types;


use classifier::EventClassifier;
use debouncer::Debouncer;
pub use types::{Change, ChangeKind};

/// Capacity of the notify → dispatcher channel. A full channel blocks
/// the notify thread until the dispatcher catches up.
const EVENT_BUFFER: usize = 1024;

type EventResult = notify::Result<notify::Event>;

/// Dispatcher lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    /// Created, not yet running
    Idle,
    /// Waiting for events
    Watching,
    /// Applying a batch of changes to the output tree
    Dispatching,
    /// Event source gone or shutdown requested
    Closed,
}

/// A live recursive subscription on the source root.
///
/// Events buffer in the channel until a dispatcher consumes them.
pub struct Subscription {
    /// Watcher handle (must be kept alive)
    watcher: RecommendedWatcher,
    events: Receiver<EventResult>,
}

/// Subscribe to changes below `root`.
pub fn subscribe(root: &Path) -> notify::Result<Subscription> {
    let (tx, events) = channel::bounded(EVENT_BUFFER);

    let mut watcher = notify::recommended_watcher(move |res| {
        // Dispatcher gone (shutdown)
        let _ = tx.send(res);
    })?;
    watcher.watch(root, RecursiveMode::Recursive)?;

    debug!("watch"; "watching {}", root.display());
    Ok(Subscription { watcher, events })
}

/// Applies debounced source changes through a `Builder`, one at a time.
pub struct Dispatcher<R = MarkdownRenderer> {
    builder: Builder<R>,
    state: WatchState,
}

impl<R: Render> Dispatcher<R> {
    pub fn new(builder: Builder<R>) -> Self {
        Self {
            builder,
            state: WatchState::Idle,
        }
    }

    pub fn state(&self) -> WatchState {
        self.state
    }

    /// Run the event loop until the subscription ends or `shutdown` fires.
    pub fn run(&mut self, subscription: Subscription, shutdown: Receiver<()>) -> WatchState {
        let Subscription { watcher, events } = subscription;
        let state = self.run_with(&events, &shutdown);
        drop(watcher);
        state
    }

    /// The event loop over a raw event channel.
    ///
    /// A disconnected event channel flushes what is pending first; a
    /// shutdown signal drops it.
    fn run_with(&mut self, events: &Receiver<EventResult>, shutdown: &Receiver<()>) -> WatchState {
        let mut debouncer = Debouncer::new();
        self.state = WatchState::Watching;

        loop {
            select! {
                recv(events) -> msg => match msg {
                    Ok(Ok(event)) => debouncer.add_event(&event),
                    Ok(Err(e)) => log!("watch"; "notify error: {}", e),
                    Err(_) => {
                        debug!("watch"; "event source closed");
                        if let Some(batch) = debouncer.take() {
                            self.dispatch_batch(batch);
                        }
                        break;
                    }
                },
                recv(shutdown) -> _ => {
                    debug!("watch"; "shutdown requested");
                    break;
                },
                default(debouncer.sleep_duration()) => {
                    if let Some(batch) = debouncer.take_if_ready() {
                        self.dispatch_batch(batch);
                    }
                },
            }
        }

        self.state = WatchState::Closed;
        self.state
    }

    /// Classify a debounced batch and apply it in arrival order.
    fn dispatch_batch(&mut self, batch: Vec<Change>) {
        let changes = EventClassifier::classify(batch, self.builder.mapper());
        if changes.is_empty() {
            return;
        }

        self.state = WatchState::Dispatching;

        let mut applied = Vec::with_capacity(changes.len());
        let mut failed = 0;
        for change in &changes {
            let name = self.display_name(&change.path);
            match self.dispatch(change) {
                Ok(()) => applied.push(format!("{} {}", change.kind.label(), name)),
                Err(e) => {
                    failed += 1;
                    status_error(&format!("failed: {name}"), &e.report());
                }
            }
        }

        if failed == 0 {
            match applied.as_slice() {
                [one] => status_success(one),
                many => status_success(&format!("applied {} changes", many.len())),
            }
        } else if !applied.is_empty() {
            debug!("watch"; "{} applied, {} failed", applied.len(), failed);
        }

        self.state = WatchState::Watching;
    }

    /// Apply one change to the output tree.
    fn dispatch(&self, change: &Change) -> crate::compiler::Result<()> {
        debug!("watch"; "{}: {}", change.kind.label(), change.path.display());

        match &change.kind {
            ChangeKind::Created | ChangeKind::Modified => {
                self.builder.build_one(&change.path)?;
            }
            ChangeKind::Removed => {
                self.builder.remove_one(&change.path)?;
                self.prune();
            }
            ChangeKind::Moved { from } => {
                self.builder.move_one(from, &change.path)?;
                self.prune();
            }
        }
        Ok(())
    }

    fn prune(&self) {
        let report = self.builder.prune();
        if report.failed > 0 {
            status_warning(&format!(
                "{} empty output directories could not be removed",
                report.failed
            ));
        }
    }

    /// Source path relative to the source root, for status lines.
    fn display_name(&self, path: &Path) -> String {
        self.builder
            .mapper()
            .relative(path)
            .map_or_else(|_| path.display().to_string(), |p| p.display().to_string())
    }
}
