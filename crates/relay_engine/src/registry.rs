use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use relay_core::Lane;

/// Process currently owned by a lane.
#[derive(Debug, Clone)]
pub(crate) struct RunSlot {
    pub token: u64,
    pub pid: u32,
    pub cancelled: Arc<AtomicBool>,
}

/// Active runs, at most one per lane.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    slots: Mutex<HashMap<Lane, RunSlot>>,
}

impl Registry {
    pub fn lock(&self) -> MutexGuard<'_, HashMap<Lane, RunSlot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_active(&self, lane: Lane) -> bool {
        self.lock().contains_key(&lane)
    }

    /// Point the lane at a newly spawned step. False if the run was removed
    /// in the meantime.
    pub fn update_pid(&self, lane: Lane, token: u64, pid: u32) -> bool {
        match self.lock().get_mut(&lane) {
            Some(slot) if slot.token == token => {
                slot.pid = pid;
                true
            }
            _ => false,
        }
    }

    /// Remove the lane's entry if it still belongs to `token`.
    pub fn release(&self, lane: Lane, token: u64) -> bool {
        let mut slots = self.lock();
        if slots.get(&lane).is_some_and(|slot| slot.token == token) {
            slots.remove(&lane);
            true
        } else {
            false
        }
    }

    /// Empty the registry, flagging every run as cancelled.
    pub fn drain(&self) -> Vec<(Lane, RunSlot)> {
        let mut drained: Vec<_> = self.lock().drain().collect();
        for (_, slot) in &drained {
            slot.cancelled.store(true, Ordering::SeqCst);
        }
        drained.sort_by_key(|(lane, _)| *lane);
        drained
    }
}
