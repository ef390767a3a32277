//! Live chat sessions keyed by browser session.

use dashmap::{mapref::entry::Entry as DashEntry, DashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard, TryLockError};
use tokio::task::JoinHandle;

use crate::conversation::ChatSession;

/// Holds a browser's current chat session. Restarting swaps the session for
/// its replacement inside the slot.
pub struct SessionSlot {
    session: Option<ChatSession>,
}

impl SessionSlot {
    fn new(session: ChatSession) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn session(&self) -> Option<&ChatSession> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut ChatSession> {
        self.session.as_mut()
    }

    /// Replace the current session with a fresh one for the same participant.
    pub fn restart(&mut self) -> Option<&mut ChatSession> {
        self.session = self.session.take().map(ChatSession::restart);
        self.session.as_mut()
    }
}

pub type SharedSlot = Arc<Mutex<SessionSlot>>;

struct Entry {
    slot: SharedSlot,
    touched: Instant,
}

impl Entry {
    fn new(slot: SharedSlot) -> Self {
        Self {
            slot,
            touched: Instant::now(),
        }
    }
}

/// Each slot sits behind its own mutex; holding the guard is holding the
/// session's single in-flight turn. Slots untouched for longer than the idle
/// timeout are evicted, matching the browser session's inactivity expiry.
#[derive(Clone)]
pub struct SessionRegistry {
    slots: Arc<DashMap<String, Entry>>,
    idle_timeout: Duration,
}

impl SessionRegistry {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            slots: Arc::new(DashMap::new()),
            idle_timeout,
        }
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Look up the slot under `key` and mark it as used.
    pub fn get(&self, key: &str) -> Option<SharedSlot> {
        self.slots.get_mut(key).map(|mut entry| {
            entry.touched = Instant::now();
            entry.slot.clone()
        })
    }

    /// Put `session` under `key` and return its slot already locked.
    ///
    /// An existing slot is reused and its session replaced, unless a turn is
    /// running in it, in which case nothing changes and the lock error is
    /// returned.
    pub fn admit(
        &self,
        key: impl Into<String>,
        session: ChatSession,
    ) -> Result<OwnedMutexGuard<SessionSlot>, TryLockError> {
        self.evict_idle();

        match self.slots.entry(key.into()) {
            DashEntry::Occupied(mut occupied) => {
                let mut guard = occupied.get().slot.clone().try_lock_owned()?;
                guard.session = Some(session);
                occupied.get_mut().touched = Instant::now();
                Ok(guard)
            }
            DashEntry::Vacant(vacant) => {
                let slot = Arc::new(Mutex::new(SessionSlot::new(session)));
                let guard = slot.clone().try_lock_owned()?;
                vacant.insert(Entry::new(slot));
                Ok(guard)
            }
        }
    }

    /// Lock the slot under `key` without waiting. `None` when the key is
    /// unknown, an error when a turn is already running.
    pub fn try_lock(
        &self,
        key: &str,
    ) -> Option<Result<OwnedMutexGuard<SessionSlot>, TryLockError>> {
        self.get(key).map(|slot| slot.try_lock_owned())
    }

    /// Drop slots idle for longer than the timeout. Slots with a running turn
    /// are kept. Returns how many were removed.
    pub fn evict_idle(&self) -> usize {
        let before = self.slots.len();
        let idle_timeout = self.idle_timeout;
        self.slots.retain(|_, entry| {
            entry.touched.elapsed() <= idle_timeout || entry.slot.try_lock().is_err()
        });
        before.saturating_sub(self.slots.len())
    }

    /// Run [`evict_idle`](Self::evict_idle) every `every` until aborted.
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let registry = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let evicted = registry.evict_idle();
                if evicted > 0 {
                    tracing::info!(evicted, remaining = registry.len(), "Evicted idle chat sessions");
                }
            }
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
