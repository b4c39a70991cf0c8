//! Subscribable session state cell.
//!
//! `SessionStore` owns the single `Snapshot` and hands out `SessionWatcher`s.
//! Each invocation of an operation takes a `Ticket` when it starts; its result
//! only commits if no newer invocation of the same operation has started since.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::watch;
use tracing::debug;

use super::state::{Operation, Phase, Session, Snapshot, Transition};

/// Proof that an invocation started, carrying its sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub operation: Operation,
    pub seq: u64,
}

pub struct SessionStore {
    tx: watch::Sender<Snapshot>,
    // Latest sequence issued per operation. Always locked inside the watch
    // write lock so issue and check are ordered with commits.
    latest: Mutex<HashMap<Operation, u64>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(Snapshot::default());
        Self {
            tx,
            latest: Mutex::new(HashMap::new()),
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Snapshot {
        self.tx.borrow().clone()
    }

    /// Current session
    pub fn session(&self) -> Session {
        self.tx.borrow().session.clone()
    }

    pub fn subscribe(&self) -> SessionWatcher {
        SessionWatcher {
            rx: self.tx.subscribe(),
        }
    }

    /// Start an invocation: issue its ticket and commit the pending phase.
    pub fn begin(&self, operation: Operation) -> Ticket {
        let mut ticket = Ticket { operation, seq: 0 };
        self.tx.send_modify(|snap| {
            let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
            let seq = latest.entry(operation).or_insert(0);
            *seq += 1;
            ticket.seq = *seq;

            snap.session.pending = true;
            snap.session.error = None;
            snap.session.field_errors.clear();
            Self::stamp(snap, operation, Phase::Pending, ticket.seq);
        });
        debug!(%operation, seq = ticket.seq, "Operation pending");
        ticket
    }

    /// Settle an invocation. Applies `apply` and returns true only if the
    /// ticket is still the latest for its operation; otherwise nothing changes.
    pub fn settle(&self, ticket: &Ticket, phase: Phase, apply: impl FnOnce(&mut Session)) -> bool {
        let committed = self.tx.send_if_modified(|snap| {
            if !self.is_current(ticket) {
                return false;
            }
            apply(&mut snap.session);
            Self::stamp(snap, ticket.operation, phase, ticket.seq);
            true
        });

        if committed {
            debug!(operation = %ticket.operation, seq = ticket.seq, ?phase, "Operation settled");
        } else {
            debug!(
                operation = %ticket.operation,
                seq = ticket.seq,
                ?phase,
                "Dropping superseded result"
            );
        }
        committed
    }

    /// Commit a synchronous operation in one step
    pub fn commit(&self, operation: Operation, apply: impl FnOnce(&mut Session)) -> Ticket {
        let mut ticket = Ticket { operation, seq: 0 };
        self.tx.send_modify(|snap| {
            let mut latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
            let seq = latest.entry(operation).or_insert(0);
            *seq += 1;
            ticket.seq = *seq;

            apply(&mut snap.session);
            Self::stamp(snap, operation, Phase::Fulfilled, ticket.seq);
        });
        debug!(%operation, seq = ticket.seq, "Operation committed");
        ticket
    }

    /// Whether `ticket` is the most recent invocation of its operation
    pub fn is_current(&self, ticket: &Ticket) -> bool {
        let latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        latest.get(&ticket.operation).copied() == Some(ticket.seq)
    }

    fn stamp(snap: &mut Snapshot, operation: Operation, phase: Phase, seq: u64) {
        snap.version += 1;
        snap.last = Some(Transition {
            operation,
            phase,
            seq,
        });
    }
}

/// Observer handle. Each watcher sees the latest snapshot after every commit;
/// a slow watcher may skip intermediate versions but never misses the newest.
#[derive(Clone)]
pub struct SessionWatcher {
    rx: watch::Receiver<Snapshot>,
}

impl SessionWatcher {
    /// Snapshot as of now, without marking it seen
    pub fn current(&self) -> Snapshot {
        self.rx.borrow().clone()
    }

    /// Wait for the next commit. Returns `None` once the store is dropped.
    pub async fn changed(&mut self) -> Option<Snapshot> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}
