use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

type Slots = HashMap<Uuid, Arc<AsyncMutex<()>>>;

/// One async mutex per guarantor, created on first use and dropped once nobody holds or awaits it.
#[derive(Clone, Default)]
pub struct BookingLocks {
    slots: Arc<Mutex<Slots>>,
}

/// Held while a guarantor's booking is checked and written.
pub struct BookingGuard {
    guard: Option<OwnedMutexGuard<()>>,
    guarantor_id: Uuid,
    slots: Arc<Mutex<Slots>>,
}

impl BookingLocks {
    pub async fn acquire(&self, guarantor_id: Uuid) -> BookingGuard {
        let slot = {
            let mut slots = lock_slots(&self.slots);
            slots.entry(guarantor_id).or_default().clone()
        };
        BookingGuard {
            guard: Some(slot.lock_owned().await),
            guarantor_id,
            slots: Arc::clone(&self.slots),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        lock_slots(&self.slots).len()
    }
}

impl Drop for BookingGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut slots = lock_slots(&self.slots);
        // Waiters clone the slot under the map lock, so a count of one means nobody else has it.
        if slots
            .get(&self.guarantor_id)
            .is_some_and(|slot| Arc::strong_count(slot) == 1)
        {
            slots.remove(&self.guarantor_id);
        }
    }
}

fn lock_slots(slots: &Mutex<Slots>) -> MutexGuard<'_, Slots> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_guarantor_waits_other_guarantor_does_not() {
        let locks = BookingLocks::default();
        let guarantor = Uuid::new_v4();
        let held = locks.acquire(guarantor).await;

        let blocked = tokio::time::timeout(Duration::from_millis(20), locks.acquire(guarantor)).await;
        assert!(blocked.is_err());

        let other = tokio::time::timeout(
            Duration::from_millis(20),
            locks.acquire(Uuid::new_v4()),
        )
        .await;
        assert!(other.is_ok());

        drop(held);
        let reacquired =
            tokio::time::timeout(Duration::from_millis(20), locks.acquire(guarantor)).await;
        assert!(reacquired.is_ok());
    }

    #[tokio::test]
    async fn released_slots_are_pruned() {
        let locks = BookingLocks::default();
        for _ in 0..5 {
            let guard = locks.acquire(Uuid::new_v4()).await;
            assert_eq!(locks.len(), 1);
            drop(guard);
        }
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn slot_survives_while_another_caller_waits() {
        let locks = BookingLocks::default();
        let guarantor = Uuid::new_v4();
        let held = locks.acquire(guarantor).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(guarantor).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(held);
        assert!(locks.len() <= 1);

        tokio::time::timeout(Duration::from_millis(200), waiter)
            .await
            .expect("waiter acquires after release")
            .expect("waiter task joins");
        assert_eq!(locks.len(), 0);
    }
}
