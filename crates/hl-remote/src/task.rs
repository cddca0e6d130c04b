//! Ownership slots for perpetual background tasks
//!
//! A [`TaskSlot`] holds at most one running task. The task receives a
//! `CancellationToken` and carries a guard that empties the slot when the
//! task future finishes or is dropped, so the slot never points at a task
//! that already exited. Cancelling empties the slot immediately; the guard
//! of a cancelled task leaves a newer occupant alone.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct RunningTask {
    id: u64,
    cancel: CancellationToken,
    // Kept so the task is not detached from its owner; never awaited.
    _handle: JoinHandle<()>,
}

#[derive(Default)]
struct SlotState {
    next_id: u64,
    current: Option<RunningTask>,
}

/// Holder of at most one background task
pub struct TaskSlot {
    name: &'static str,
    state: Arc<Mutex<SlotState>>,
}

impl TaskSlot {
    /// Create an empty slot; `name` labels log lines
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: Arc::new(Mutex::new(SlotState::default())),
        }
    }

    fn lock(state: &Mutex<SlotState>) -> MutexGuard<'_, SlotState> {
        state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a task currently occupies the slot
    pub fn is_running(&self) -> bool {
        Self::lock(&self.state).current.is_some()
    }

    /// Spawn the task built by `make` unless the slot is occupied.
    ///
    /// Returns `true` if a task was spawned.
    pub fn spawn_if_idle<F, Fut>(&self, make: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        // Held across the spawn so the guard of a task that finishes
        // immediately cannot run before the slot records it.
        let mut state = Self::lock(&self.state);
        if state.current.is_some() {
            return false;
        }

        state.next_id += 1;
        let id = state.next_id;
        let cancel = CancellationToken::new();
        let guard = SlotGuard {
            name: self.name,
            id,
            state: Arc::clone(&self.state),
        };
        let task = make(cancel.clone());
        let handle = tokio::spawn(async move {
            let _guard = guard;
            task.await;
        });

        state.current = Some(RunningTask {
            id,
            cancel,
            _handle: handle,
        });
        tracing::debug!(task = self.name, id, "Background task started");
        true
    }

    /// Cancel the occupant, if any, and empty the slot.
    ///
    /// Safe to call repeatedly and after the task exited on its own.
    pub fn cancel(&self) -> bool {
        let running = Self::lock(&self.state).current.take();
        match running {
            Some(running) => {
                tracing::debug!(task = self.name, id = running.id, "Cancelling background task");
                running.cancel.cancel();
                true
            }
            None => false,
        }
    }
}

impl Drop for TaskSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

struct SlotGuard {
    name: &'static str,
    id: u64,
    state: Arc<Mutex<SlotState>>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut state = TaskSlot::lock(&self.state);
        if state.current.as_ref().is_some_and(|t| t.id == self.id) {
            state.current = None;
        }
        tracing::debug!(task = self.name, id = self.id, "Background task exited");
    }
}
