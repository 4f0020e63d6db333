use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;

use vaidya_audit::{AuditError, AuditPage, AuditQuery, AuditRecord, AuditStore};

use crate::store::PgStore;

fn audit_err(e: sqlx::Error) -> AuditError {
    AuditError::Backend(e.to_string())
}

#[derive(FromRow)]
struct AuditRow {
    id: String,
    admin_id: String,
    action_type: String,
    target_type: String,
    target_id: String,
    details: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl From<AuditRow> for AuditRecord {
    fn from(row: AuditRow) -> Self {
        AuditRecord {
            id: row.id,
            admin_id: row.admin_id,
            action_type: row.action_type,
            target_type: row.target_type,
            target_id: row.target_id,
            details: row.details,
            created_at: row.created_at,
        }
    }
}

/// Build the WHERE clause for an audit query; bind values in the same order.
fn where_clause(query: &AuditQuery) -> (String, Vec<String>) {
    let mut conditions = Vec::new();
    let mut binds = Vec::new();

    for (column, value) in [
        ("admin_id", &query.admin_id),
        ("action_type", &query.action_type),
        ("target_type", &query.target_type),
        ("target_id", &query.target_id),
    ] {
        if let Some(value) = value {
            binds.push(value.clone());
            conditions.push(format!("{column} = ${}", binds.len()));
        }
    }
    if query.from.is_some() {
        conditions.push(format!("created_at >= ${}", binds.len() + 1));
    }
    if query.to.is_some() {
        let offset = usize::from(query.from.is_some());
        conditions.push(format!("created_at <= ${}", binds.len() + 1 + offset));
    }

    let clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    (clause, binds)
}

#[async_trait]
impl AuditStore for PgStore {
    async fn record(&self, entry: AuditRecord) -> Result<(), AuditError> {
        sqlx::query(
            "INSERT INTO audit_log (id, admin_id, action_type, target_type, target_id, details, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&entry.id)
        .bind(&entry.admin_id)
        .bind(&entry.action_type)
        .bind(&entry.target_type)
        .bind(&entry.target_id)
        .bind(&entry.details)
        .bind(entry.created_at)
        .execute(self.pool())
        .await
        .map_err(audit_err)?;
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<AuditRecord>, AuditError> {
        Ok(sqlx::query_as::<_, AuditRow>("SELECT * FROM audit_log WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(audit_err)?
            .map(AuditRecord::from))
    }

    async fn query(&self, query: &AuditQuery) -> Result<AuditPage, AuditError> {
        let limit = query.effective_limit();
        let offset = query.effective_offset();
        let (clause, binds) = where_clause(query);

        let count_sql = format!("SELECT COUNT(*) FROM audit_log {clause}");
        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        for bind in &binds {
            count_q = count_q.bind(bind);
        }
        if let Some(from) = query.from {
            count_q = count_q.bind(from);
        }
        if let Some(to) = query.to {
            count_q = count_q.bind(to);
        }
        let total = count_q.fetch_one(self.pool()).await.map_err(audit_err)?;

        let select_sql = format!(
            "SELECT * FROM audit_log {clause}
             ORDER BY created_at DESC
             LIMIT {limit} OFFSET {offset}"
        );
        let mut select_q = sqlx::query_as::<_, AuditRow>(&select_sql);
        for bind in &binds {
            select_q = select_q.bind(bind);
        }
        if let Some(from) = query.from {
            select_q = select_q.bind(from);
        }
        if let Some(to) = query.to {
            select_q = select_q.bind(to);
        }
        let records = select_q
            .fetch_all(self.pool())
            .await
            .map_err(audit_err)?
            .into_iter()
            .map(AuditRecord::from)
            .collect();

        Ok(AuditPage {
            records,
            total: u64::try_from(total).unwrap_or(0),
            limit,
            offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn where_clause_numbers_binds_in_order() {
        let query = AuditQuery {
            admin_id: Some("a1".into()),
            target_id: Some("k1".into()),
            from: Some(Utc::now()),
            ..Default::default()
        };
        let (clause, binds) = where_clause(&query);
        assert_eq!(binds, vec!["a1".to_owned(), "k1".to_owned()]);
        assert_eq!(clause, "WHERE admin_id = $1 AND target_id = $2 AND created_at >= $3");
    }

    #[test]
    fn empty_query_has_no_clause() {
        let (clause, binds) = where_clause(&AuditQuery::default());
        assert!(clause.is_empty());
        assert!(binds.is_empty());
    }
}
