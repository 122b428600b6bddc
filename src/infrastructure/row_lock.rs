use crate::domain::customer::CustomerId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-customer write locks.
///
/// A store transaction holds the guard for its whole lifetime, so no two
/// transactions mutate the same customer at once while different customers
/// proceed independently.
#[derive(Default, Clone)]
pub struct RowLocks {
    rows: Arc<Mutex<HashMap<CustomerId, Arc<Mutex<()>>>>>,
}

impl RowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until the row for `customer_id` is free and takes it.
    ///
    /// Rows nobody holds or waits on are dropped from the map on the way in.
    pub async fn acquire(&self, customer_id: CustomerId) -> OwnedMutexGuard<()> {
        let row = {
            let mut rows = self.rows.lock().await;
            rows.retain(|id, row| *id == customer_id || Arc::strong_count(row) > 1);
            rows.entry(customer_id).or_default().clone()
        };
        row.lock_owned().await
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.rows.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_row_is_exclusive() {
        let locks = RowLocks::new();
        let guard = locks.acquire(1).await;

        let contender = locks.clone();
        let waiter = tokio::spawn(async move {
            let _guard = contender.acquire(1).await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("lock was never released")
            .unwrap();
    }

    #[tokio::test]
    async fn test_released_rows_are_forgotten() {
        let locks = RowLocks::new();
        for id in 1..=50 {
            drop(locks.acquire(id).await);
        }
        let held = locks.acquire(100).await;
        assert_eq!(locks.tracked().await, 1);

        let _other = locks.acquire(101).await;
        assert_eq!(locks.tracked().await, 2);
        drop(held);
    }

    #[tokio::test]
    async fn test_different_rows_do_not_block() {
        let locks = RowLocks::new();
        let _first = locks.acquire(1).await;
        let second = tokio::time::timeout(Duration::from_millis(100), locks.acquire(2)).await;
        assert!(second.is_ok());
    }
}
