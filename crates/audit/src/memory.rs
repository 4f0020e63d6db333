use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::AuditError;
use crate::record::{AuditPage, AuditQuery, AuditRecord};
use crate::store::AuditStore;

/// In-memory audit store using `DashMap`. Suitable for development and
/// testing.
#[derive(Default)]
pub struct MemoryAuditStore {
    records: DashMap<String, AuditRecord>,
}

impl MemoryAuditStore {
    /// Create a new empty in-memory audit store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches_filter(filter: Option<&String>, value: &str) -> bool {
    filter.is_none_or(|f| f == value)
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn record(&self, entry: AuditRecord) -> Result<(), AuditError> {
        self.records.insert(entry.id.clone(), entry);
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<AuditRecord>, AuditError> {
        Ok(self.records.get(id).map(|r| r.value().clone()))
    }

    async fn query(&self, query: &AuditQuery) -> Result<AuditPage, AuditError> {
        let limit = query.effective_limit();
        let offset = query.effective_offset();

        let mut matching: Vec<AuditRecord> = self
            .records
            .iter()
            .filter_map(|entry| {
                let rec = entry.value();
                if !matches_filter(query.admin_id.as_ref(), &rec.admin_id) {
                    return None;
                }
                if !matches_filter(query.action_type.as_ref(), &rec.action_type) {
                    return None;
                }
                if !matches_filter(query.target_type.as_ref(), &rec.target_type) {
                    return None;
                }
                if !matches_filter(query.target_id.as_ref(), &rec.target_id) {
                    return None;
                }
                if let Some(ref from) = query.from {
                    if rec.created_at < *from {
                        return None;
                    }
                }
                if let Some(ref to) = query.to {
                    if rec.created_at > *to {
                        return None;
                    }
                }
                Some(rec.clone())
            })
            .collect();

        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let records: Vec<AuditRecord> = matching
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect();

        Ok(AuditPage {
            records,
            total,
            limit,
            offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(admin: &str, action: &str, target: &str) -> AuditRecord {
        AuditRecord::new(admin, action, "api_key", target, serde_json::json!({}))
    }

    #[tokio::test]
    async fn record_and_get() {
        let store = MemoryAuditStore::new();
        let rec = record("admin-1", "add_api_key", "k1");
        let id = rec.id.clone();
        store.record(rec).await.unwrap();

        let fetched = store.get_by_id(&id).await.unwrap().unwrap();
        assert_eq!(fetched.admin_id, "admin-1");
    }

    #[tokio::test]
    async fn query_filters_by_action_type() {
        let store = MemoryAuditStore::new();
        store.record(record("a", "add_api_key", "k1")).await.unwrap();
        store.record(record("a", "delete_api_key", "k1")).await.unwrap();

        let page = store
            .query(&AuditQuery {
                action_type: Some("add_api_key".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.records[0].action_type, "add_api_key");
    }

    #[tokio::test]
    async fn query_paginates() {
        let store = MemoryAuditStore::new();
        for i in 0..5 {
            store
                .record(record("a", "toggle_feature", &format!("f{i}")))
                .await
                .unwrap();
        }

        let page = store
            .query(&AuditQuery {
                limit: Some(2),
                offset: Some(2),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.records.len(), 2);
        assert_eq!(page.offset, 2);
    }
}
