use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{StoreError, TrackingStore};
use crate::domain::tracking::{OrderId, OrderStatus, OrderTrackingRecord};

/// Process-local store. Same ordering and concurrency rules as Postgres.
#[derive(Default)]
pub struct InMemoryTrackingStore {
    records: RwLock<BTreeMap<OrderId, OrderTrackingRecord>>,
}

impl InMemoryTrackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl TrackingStore for InMemoryTrackingStore {
    async fn create(&self, record: &OrderTrackingRecord) -> Result<OrderTrackingRecord, StoreError> {
        let mut records = self.records.write().await;

        if records.contains_key(&record.order_id) {
            return Err(StoreError::DuplicateOrder(record.order_id));
        }

        records.insert(record.order_id, record.clone());
        Ok(record.clone())
    }

    async fn find_by_order_id(&self, order_id: OrderId) -> Result<Option<OrderTrackingRecord>, StoreError> {
        Ok(self.records.read().await.get(&order_id).cloned())
    }

    async fn find_by_customer(&self, customer_id: &str) -> Result<Vec<OrderTrackingRecord>, StoreError> {
        let mut matches: Vec<_> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.customer_id == customer_id)
            .cloned()
            .collect();

        matches.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.order_id.cmp(&a.order_id)));
        Ok(matches)
    }

    async fn find_by_status(&self, statuses: &[OrderStatus]) -> Result<Vec<OrderTrackingRecord>, StoreError> {
        let mut matches: Vec<_> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| statuses.contains(&r.status))
            .cloned()
            .collect();

        matches.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then(a.order_id.cmp(&b.order_id)));
        Ok(matches)
    }

    async fn update(&self, record: &OrderTrackingRecord) -> Result<OrderTrackingRecord, StoreError> {
        let mut records = self.records.write().await;

        let stored = records
            .get_mut(&record.order_id)
            .ok_or(StoreError::NotFound(record.order_id))?;

        if stored.version != record.version {
            return Err(StoreError::VersionConflict {
                order_id: record.order_id,
                expected: record.version,
            });
        }

        let mut next = record.clone();
        next.version += 1;
        *stored = next.clone();

        Ok(next)
    }

    async fn list(&self, offset: i64, limit: i64) -> Result<Vec<OrderTrackingRecord>, StoreError> {
        let offset = usize::try_from(offset).unwrap_or(0);
        let limit = usize::try_from(limit).unwrap_or(0);

        Ok(self
            .records
            .read()
            .await
            .values()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tracking::LineItem;
    use chrono::{Duration, Utc};

    fn record(order_id: OrderId, customer: &str) -> OrderTrackingRecord {
        let items = vec![LineItem::new(1, 1, None).unwrap()];
        OrderTrackingRecord::open(order_id, customer, items, None).unwrap()
    }

    #[tokio::test]
    async fn test_create_rejects_duplicates() {
        let store = InMemoryTrackingStore::new();
        store.create(&record(1, "a")).await.unwrap();

        let result = store.create(&record(1, "b")).await;
        assert!(matches!(result, Err(StoreError::DuplicateOrder(1))));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_update_bumps_version_and_detects_conflicts() {
        let store = InMemoryTrackingStore::new();
        let created = store.create(&record(1, "a")).await.unwrap();

        let mut first = created.clone();
        first.status = OrderStatus::InPreparation;
        let saved = store.update(&first).await.unwrap();
        assert_eq!(saved.version, 1);

        // Stale writer still holds version 0
        let mut stale = created;
        stale.status = OrderStatus::Ready;
        assert!(matches!(
            store.update(&stale).await,
            Err(StoreError::VersionConflict { order_id: 1, expected: 0 })
        ));

        let stored = store.find_by_order_id(1).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::InPreparation);
    }

    #[tokio::test]
    async fn test_update_missing_record() {
        let store = InMemoryTrackingStore::new();
        assert!(matches!(
            store.update(&record(9, "a")).await,
            Err(StoreError::NotFound(9))
        ));
    }

    #[tokio::test]
    async fn test_query_ordering() {
        let store = InMemoryTrackingStore::new();
        let now = Utc::now();

        for (id, minutes_ago, status) in [
            (1, 30, OrderStatus::Ready),
            (2, 10, OrderStatus::InPreparation),
            (3, 20, OrderStatus::InPreparation),
            (4, 5, OrderStatus::Received),
        ] {
            let mut r = record(id, "cpf");
            r.status = status;
            r.updated_at = now - Duration::minutes(minutes_ago);
            store.create(&r).await.unwrap();
        }

        let queue = store.find_by_status(&OrderStatus::KITCHEN_QUEUE).await.unwrap();
        let ids: Vec<_> = queue.iter().map(|r| r.order_id).collect();
        assert_eq!(ids, vec![1, 3, 2]);

        let history = store.find_by_customer("cpf").await.unwrap();
        let ids: Vec<_> = history.iter().map(|r| r.order_id).collect();
        assert_eq!(ids, vec![4, 2, 3, 1]);

        let page = store.list(1, 2).await.unwrap();
        let ids: Vec<_> = page.iter().map(|r| r.order_id).collect();
        assert_eq!(ids, vec![2, 3]);
    }
}
