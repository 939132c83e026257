//! SQLite document store.
//!
//! Each collection is a table of `(id, body)` rows where `body` is the JSON
//! document. Filters and sorts are evaluated with `json_extract` over the
//! body; the id column carries the primary key, which is what turns a
//! repeated identity into [`StoreError::DuplicateIdentity`].

use std::str::FromStr;

use sqlx::{sqlite::SqliteConnectOptions, SqlitePool};
use tracing::{debug, info};

use super::{
    document_id, Collection, Condition, Document, DocumentStore, Filter, Query, Result, StoreError,
    ID_FIELD,
};

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let database_config = SqliteConnectOptions::from_str(database_url)
            .map_err(StoreError::Connection)?
            .create_if_missing(true);

        let pool = SqlitePool::connect_lazy_with(database_config);

        let store = Self { pool };
        store.initialize_tables().await?;

        info!("Document store initialized at {}", database_url);
        Ok(store)
    }

    async fn initialize_tables(&self) -> Result<()> {
        for collection in Collection::ALL {
            sqlx::query(&format!(
                r#"
                CREATE TABLE IF NOT EXISTS {} (
                    id TEXT PRIMARY KEY,
                    body TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
                )
                "#,
                collection
            ))
            .execute(&self.pool)
            .await
            .map_err(StoreError::Connection)?;
        }

        // Relationship lookups used by every integrity check
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_commits_project_id ON commits(json_extract(body, '$.project_id'))",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_reports_commit_id ON reports(json_extract(body, '$.commit_id'))",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_user_x_project_user_id ON user_x_project(json_extract(body, '$.user_id'))",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

fn column(field: &str) -> String {
    if field == ID_FIELD {
        "id".to_string()
    } else {
        format!("json_extract(body, '$.{}')", field)
    }
}

/// Render a filter as a SQL predicate plus its bind values, in order.
fn where_clause(filter: &Filter) -> (String, Vec<String>) {
    let mut clauses = Vec::new();
    let mut binds = Vec::new();

    for condition in filter.conditions() {
        match condition {
            Condition::Equals(field, value) => {
                clauses.push(format!("{} = ?", column(field)));
                binds.push(value.clone());
            }
            Condition::In(_, values) if values.is_empty() => clauses.push("0".to_string()),
            Condition::In(field, values) => {
                let placeholders = vec!["?"; values.len()].join(", ");
                clauses.push(format!("{} IN ({})", column(field), placeholders));
                binds.extend(values.iter().cloned());
            }
        }
    }

    if clauses.is_empty() {
        ("1".to_string(), binds)
    } else {
        (clauses.join(" AND "), binds)
    }
}

fn parse_body(body: &str) -> Result<Document> {
    Ok(serde_json::from_str(body)?)
}

impl DocumentStore for SqliteStore {
    async fn insert(&self, collection: Collection, document: Document) -> Result<()> {
        let id = document_id(&document)?.to_string();
        let body = serde_json::to_string(&document)?;

        let result = sqlx::query(&format!("INSERT INTO {} (id, body) VALUES (?, ?)", collection))
            .bind(&id)
            .bind(&body)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                debug!(%collection, id = id.as_str(), "Duplicate identity rejected");
                Err(StoreError::DuplicateIdentity(id))
            }
            Err(err) => Err(StoreError::Query(err)),
        }
    }

    async fn find_one(&self, collection: Collection, filter: &Filter) -> Result<Option<Document>> {
        let query = Query::new(filter.clone()).limit(1);
        Ok(self.find(collection, &query).await?.into_iter().next())
    }

    async fn find(&self, collection: Collection, query: &Query) -> Result<Vec<Document>> {
        let (predicate, binds) = where_clause(&query.filter);

        let order = match query.sort {
            Some(sort) if sort.descending => format!("{} DESC, rowid", column(sort.field)),
            Some(sort) => format!("{} ASC, rowid", column(sort.field)),
            None => "rowid".to_string(),
        };

        let mut sql = format!("SELECT body FROM {} WHERE {} ORDER BY {}", collection, predicate, order);
        if query.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut statement = sqlx::query_scalar::<_, String>(&sql);
        for value in binds {
            statement = statement.bind(value);
        }
        if let Some(limit) = query.limit {
            statement = statement.bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let bodies = statement.fetch_all(&self.pool).await?;
        bodies.iter().map(|body| parse_body(body)).collect()
    }

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> Result<u64> {
        let (predicate, binds) = where_clause(filter);
        let sql = format!("DELETE FROM {} WHERE {}", collection, predicate);

        let mut statement = sqlx::query(&sql);
        for value in binds {
            statement = statement.bind(value);
        }

        Ok(statement.execute(&self.pool).await?.rows_affected())
    }

    async fn delete_one(&self, collection: Collection, filter: &Filter) -> Result<u64> {
        let (predicate, binds) = where_clause(filter);
        let sql = format!(
            "DELETE FROM {table} WHERE rowid IN (SELECT rowid FROM {table} WHERE {} ORDER BY rowid LIMIT 1)",
            predicate,
            table = collection
        );

        let mut statement = sqlx::query(&sql);
        for value in binds {
            statement = statement.bind(value);
        }

        Ok(statement.execute(&self.pool).await?.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_clause_rendering() {
        let (sql, binds) = where_clause(&Filter::new());
        assert_eq!(sql, "1");
        assert!(binds.is_empty());

        let filter = Filter::by_id("abc").eq("branch", "main");
        let (sql, binds) = where_clause(&filter);
        assert_eq!(sql, "id = ? AND json_extract(body, '$.branch') = ?");
        assert_eq!(binds, ["abc", "main"]);

        let filter = Filter::new().any_of("commit_id", ["c1", "c2"]);
        let (sql, binds) = where_clause(&filter);
        assert_eq!(sql, "json_extract(body, '$.commit_id') IN (?, ?)");
        assert_eq!(binds, ["c1", "c2"]);

        let filter = Filter::new().any_of("commit_id", Vec::<String>::new());
        assert_eq!(where_clause(&filter).0, "0");
    }
}
