use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use notify::EventKind;
use notify::event::{ModifyKind, RenameMode};
use rustc_hash::FxHashMap;

use super::types::{Change, ChangeKind};
use crate::debug;

/// Quiet period after the last event before a batch is dispatched.
pub(super) const DEBOUNCE_MS: u64 = 100;
/// Upper bound on how long a continuous event stream can hold a batch back.
pub(super) const MAX_WAIT_MS: u64 = 1000;

/// A pending change and the order in which its path was first seen.
#[derive(Debug)]
pub(super) struct Pending {
    pub(super) seq: u64,
    pub(super) kind: ChangeKind,
}

/// Pure debouncer: coalesces events per path and handles timing.
/// No filesystem access.
pub(super) struct Debouncer {
    /// Path → pending change (for moves, keyed by the destination)
    pub(super) pending: FxHashMap<PathBuf, Pending>,
    next_seq: u64,
    pub(super) first_event: Option<Instant>,
    pub(super) last_event: Option<Instant>,
}

impl Debouncer {
    pub(super) fn new() -> Self {
        Self {
            pending: FxHashMap::default(),
            next_seq: 0,
            first_event: None,
            last_event: None,
        }
    }

    /// Add a notify event.
    pub(super) fn add_event(&mut self, event: &notify::Event) {
        let changes = changes_from_event(event);
        if changes.is_empty() {
            return;
        }

        debug!("watch"; "raw notify: {:?} {:?}", event.kind, event.paths);

        for change in changes {
            self.push(change);
        }

        let now = Instant::now();
        self.first_event.get_or_insert(now);
        self.last_event = Some(now);
    }

    /// Coalesce one change into the pending set.
    pub(super) fn push(&mut self, change: Change) {
        match change.kind {
            ChangeKind::Moved { from } => self.push_move(from, change.path),
            kind => self.merge(change.path, kind),
        }
    }

    /// Merge rules for a created, modified or removed path:
    /// - Removed → Created/Modified: restored, use the new event
    /// - Modified → Removed: upgrade to Removed
    /// - Created → Removed: appeared then vanished, discard
    /// - Moved(a→b) → Created/Modified(b): Removed(a) + Created(b)
    /// - Moved(a→b) → Removed(b): Removed(a)
    /// - otherwise: first event wins
    fn merge(&mut self, path: PathBuf, kind: ChangeKind) {
        let Some(existing) = self.pending.get(&path).map(|p| p.kind.clone()) else {
            debug!("watch"; "event {}: {}", kind.label(), path.display());
            self.insert(path, kind);
            return;
        };

        match (existing, kind) {
            (ChangeKind::Removed, kind @ (ChangeKind::Created | ChangeKind::Modified)) => {
                debug!("watch"; "restore removed->{}: {}", kind.label(), path.display());
                self.replace(&path, kind);
            }
            (ChangeKind::Modified, ChangeKind::Removed) => {
                debug!("watch"; "upgrade modified->removed: {}", path.display());
                self.replace(&path, ChangeKind::Removed);
            }
            (ChangeKind::Created, ChangeKind::Removed) => {
                debug!("watch"; "discard created+removed: {}", path.display());
                self.pending.remove(&path);
            }
            (ChangeKind::Moved { from }, ChangeKind::Created | ChangeKind::Modified) => {
                debug!("watch"; "split moved+modified: {}", path.display());
                self.pending.remove(&path);
                self.merge(from, ChangeKind::Removed);
                self.insert(path, ChangeKind::Created);
            }
            (ChangeKind::Moved { from }, ChangeKind::Removed) => {
                debug!("watch"; "collapse moved+removed: {}", path.display());
                self.pending.remove(&path);
                self.merge(from, ChangeKind::Removed);
            }
            _ => {}
        }
    }

    /// Coalesce a rename of `from` to `to` with whatever is pending for
    /// either path. A move replaces anything pending at its destination.
    fn push_move(&mut self, from: PathBuf, to: PathBuf) {
        if from == to {
            self.merge(to, ChangeKind::Modified);
            return;
        }

        let kind = match self.pending.remove(&from) {
            // Never built, so there is nothing to move
            Some(Pending {
                kind: ChangeKind::Created,
                ..
            }) => {
                debug!("watch"; "fold created+moved: {}", to.display());
                ChangeKind::Created
            }
            // Stale output must go, and the new location needs a render
            Some(Pending {
                seq,
                kind: ChangeKind::Modified,
            }) => {
                debug!("watch"; "split modified+moved: {}", from.display());
                self.pending.insert(
                    from,
                    Pending {
                        seq,
                        kind: ChangeKind::Removed,
                    },
                );
                ChangeKind::Created
            }
            // a → from → to
            Some(Pending {
                kind: ChangeKind::Moved { from: origin },
                ..
            }) => {
                if origin == to {
                    ChangeKind::Modified
                } else {
                    ChangeKind::Moved { from: origin }
                }
            }
            // Rename backends report the halves of a move on their own first
            Some(Pending {
                kind: ChangeKind::Removed,
                ..
            })
            | None => ChangeKind::Moved { from },
        };

        debug!("watch"; "event {}: {}", kind.label(), to.display());
        match self.pending.get(&to).map(|p| p.seq) {
            Some(seq) => {
                self.pending.insert(to, Pending { seq, kind });
            }
            None => self.insert(to, kind),
        }
    }

    fn insert(&mut self, path: PathBuf, kind: ChangeKind) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert(path, Pending { seq, kind });
    }

    fn replace(&mut self, path: &Path, kind: ChangeKind) {
        if let Some(pending) = self.pending.get_mut(path) {
            pending.kind = kind;
        }
    }

    /// Take the batch if the quiet period (or the maximum wait) elapsed.
    pub(super) fn take_if_ready(&mut self) -> Option<Vec<Change>> {
        if !self.is_due() {
            return None;
        }
        self.take()
    }

    /// Take whatever is pending, in first-arrival order.
    pub(super) fn take(&mut self) -> Option<Vec<Change>> {
        self.first_event = None;
        self.last_event = None;

        let mut pending: Vec<_> = std::mem::take(&mut self.pending).into_iter().collect();
        if pending.is_empty() {
            return None;
        }

        pending.sort_by_key(|(_, p)| p.seq);
        Some(
            pending
                .into_iter()
                .map(|(path, p)| Change::new(path, p.kind))
                .collect(),
        )
    }

    pub(super) fn is_due(&self) -> bool {
        let (Some(first), Some(last)) = (self.first_event, self.last_event) else {
            return false;
        };
        last.elapsed() >= Duration::from_millis(DEBOUNCE_MS)
            || first.elapsed() >= Duration::from_millis(MAX_WAIT_MS)
    }

    /// Precise sleep duration until the batch can be taken.
    pub(super) fn sleep_duration(&self) -> Duration {
        let (Some(first), Some(last)) = (self.first_event, self.last_event) else {
            return Duration::from_secs(86400);
        };

        let debounce_remaining = Duration::from_millis(DEBOUNCE_MS).saturating_sub(last.elapsed());
        let max_wait_remaining = Duration::from_millis(MAX_WAIT_MS).saturating_sub(first.elapsed());

        debounce_remaining
            .min(max_wait_remaining)
            .max(Duration::from_millis(1))
    }
}

/// Translate a raw notify event into changes, dropping editor temp files.
pub(super) fn changes_from_event(event: &notify::Event) -> Vec<Change> {
    let each = |kind: ChangeKind| -> Vec<Change> {
        event
            .paths
            .iter()
            .filter(|p| !is_temp_file(p))
            .map(|p| Change::new(p.clone(), kind.clone()))
            .collect()
    };

    match event.kind {
        EventKind::Create(_) => each(ChangeKind::Created),
        EventKind::Remove(_) => each(ChangeKind::Removed),
        // mtime/atime/chmod noise
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            rename(&event.paths[0], &event.paths[1]).into_iter().collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => each(ChangeKind::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => each(ChangeKind::Created),
        EventKind::Modify(_) => each(ChangeKind::Modified),
        _ => {
            debug!("watch"; "ignored {:?}: {:?}", event.kind, event.paths);
            Vec::new()
        }
    }
}

/// A rename involving a temp file is a save (temp → real) or a delete
/// (real → temp) from the document's point of view.
fn rename(from: &Path, to: &Path) -> Option<Change> {
    match (is_temp_file(from), is_temp_file(to)) {
        (false, false) => Some(Change::moved(from, to)),
        (true, false) => Some(Change::new(to, ChangeKind::Modified)),
        (false, true) => Some(Change::new(from, ChangeKind::Removed)),
        (true, true) => None,
    }
}

/// Check if path is a temp/backup file (editor artifacts).
pub(super) fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "swx" | "tmp")
        || name.ends_with('~')
        || name.starts_with(".#")
        || (name.starts_with('#') && name.ends_with('#'))
}
