//! Postgres adapter: runs core statements over an `sqlx` connection pool.
//!
//! Arguments are bound by their `SqlValue` variant; result columns are decoded
//! by their Postgres type name, so the core never sees driver types.

use std::future::Future;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{
    postgres::{PgArguments, PgPoolOptions, PgRow},
    query::Query,
    Column, PgPool, Postgres, Row as _, TypeInfo, ValueRef,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use gruz_core::{
    errors::Error,
    mapper::Row,
    ports::StatementExecutor,
    query::{SqlType, SqlValue, Statement},
    Result,
};

const SCHEMA: &str = include_str!("schema.sql");

#[derive(Clone, Debug)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(std::time::Duration::from_secs(10))
            .connect(url)
            .await
            .map_err(db_error)?;
        tracing::info!(max_connections, "connected to postgres");
        Ok(Self { pool })
    }

    /// Create tables and indexes if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        for stmt in schema_statements(SCHEMA) {
            sqlx::query(stmt)
                .execute(&self.pool)
                .await
                .map_err(db_error)?;
        }
        tracing::info!("database schema ready");
        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn run<T, F>(&self, cancel: &CancellationToken, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>> + Send,
    {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled),
            res = fut => res.map_err(db_error),
        }
    }
}

#[async_trait]
impl StatementExecutor for PgExecutor {
    async fn fetch_all(&self, stmt: &Statement, cancel: &CancellationToken) -> Result<Vec<Row>> {
        let query = bind_all(sqlx::query(&stmt.sql), &stmt.args);
        let rows = self.run(cancel, query.fetch_all(&self.pool)).await?;
        rows.iter().map(decode_row).collect()
    }

    async fn fetch_optional(
        &self,
        stmt: &Statement,
        cancel: &CancellationToken,
    ) -> Result<Option<Row>> {
        let query = bind_all(sqlx::query(&stmt.sql), &stmt.args);
        let row = self.run(cancel, query.fetch_optional(&self.pool)).await?;
        row.as_ref().map(decode_row).transpose()
    }

    async fn fetch_scalar(&self, stmt: &Statement, cancel: &CancellationToken) -> Result<i64> {
        let query = bind_all(sqlx::query(&stmt.sql), &stmt.args);
        let row = self.run(cancel, query.fetch_one(&self.pool)).await?;
        match decode_row(&row)?.get(0) {
            Some(SqlValue::Int(n)) => Ok(*n),
            other => Err(Error::Decode {
                column: 0,
                reason: format!("expected an integer scalar, got {other:?}"),
            }),
        }
    }
}

fn db_error(e: sqlx::Error) -> Error {
    Error::Database(e.to_string())
}

fn bind_all<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    args: &'q [SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for arg in args {
        query = match arg {
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Float(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.as_str()),
            SqlValue::TextArray(v) => query.bind(v.clone()),
            SqlValue::Uuid(v) => query.bind(*v),
            SqlValue::Timestamp(v) => query.bind(*v),
            SqlValue::Null(ty) => match ty {
                SqlType::Int => query.bind(None::<i64>),
                SqlType::Float => query.bind(None::<f64>),
                SqlType::Text => query.bind(None::<String>),
                SqlType::TextArray => query.bind(None::<Vec<String>>),
                SqlType::Uuid => query.bind(None::<Uuid>),
                SqlType::Timestamp => query.bind(None::<DateTime<Utc>>),
            },
        };
    }
    query
}

/// Map a Postgres type name to the core value kind it decodes into.
fn column_kind(type_name: &str) -> Option<SqlType> {
    match type_name {
        "INT2" | "INT4" | "INT8" => Some(SqlType::Int),
        "FLOAT4" | "FLOAT8" => Some(SqlType::Float),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => Some(SqlType::Text),
        "TEXT[]" | "VARCHAR[]" => Some(SqlType::TextArray),
        "UUID" => Some(SqlType::Uuid),
        "TIMESTAMPTZ" | "TIMESTAMP" => Some(SqlType::Timestamp),
        _ => None,
    }
}

fn decode_row(row: &PgRow) -> Result<Row> {
    let mut values = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        let type_name = column.type_info().name();
        let kind = column_kind(type_name).ok_or_else(|| Error::Decode {
            column: idx,
            reason: format!("unsupported column type {type_name}"),
        })?;

        let is_null = row.try_get_raw(idx).map_err(db_error)?.is_null();
        if is_null {
            values.push(SqlValue::Null(kind));
            continue;
        }

        let decode = |e: sqlx::Error| Error::Decode {
            column: idx,
            reason: e.to_string(),
        };
        let value = match (kind, type_name) {
            (SqlType::Int, "INT2") => SqlValue::Int(row.try_get::<i16, _>(idx).map_err(decode)?.into()),
            (SqlType::Int, "INT4") => SqlValue::Int(row.try_get::<i32, _>(idx).map_err(decode)?.into()),
            (SqlType::Int, _) => SqlValue::Int(row.try_get::<i64, _>(idx).map_err(decode)?),
            (SqlType::Float, "FLOAT4") => {
                SqlValue::Float(row.try_get::<f32, _>(idx).map_err(decode)?.into())
            }
            (SqlType::Float, _) => SqlValue::Float(row.try_get::<f64, _>(idx).map_err(decode)?),
            (SqlType::Text, _) => SqlValue::Text(row.try_get::<String, _>(idx).map_err(decode)?),
            (SqlType::TextArray, _) => {
                SqlValue::TextArray(row.try_get::<Vec<String>, _>(idx).map_err(decode)?)
            }
            (SqlType::Uuid, _) => SqlValue::Uuid(row.try_get::<Uuid, _>(idx).map_err(decode)?),
            (SqlType::Timestamp, "TIMESTAMP") => SqlValue::Timestamp(
                row.try_get::<NaiveDateTime, _>(idx)
                    .map_err(decode)?
                    .and_utc(),
            ),
            (SqlType::Timestamp, _) => {
                SqlValue::Timestamp(row.try_get::<DateTime<Utc>, _>(idx).map_err(decode)?)
            }
        };
        values.push(value);
    }
    Ok(Row::new(values))
}

/// Split the bundled schema into individual statements.
fn schema_statements(schema: &str) -> impl Iterator<Item = &str> {
    schema
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_map_to_value_kinds() {
        assert_eq!(column_kind("UUID"), Some(SqlType::Uuid));
        assert_eq!(column_kind("INT8"), Some(SqlType::Int));
        assert_eq!(column_kind("INT4"), Some(SqlType::Int));
        assert_eq!(column_kind("FLOAT8"), Some(SqlType::Float));
        assert_eq!(column_kind("VARCHAR"), Some(SqlType::Text));
        assert_eq!(column_kind("TEXT[]"), Some(SqlType::TextArray));
        assert_eq!(column_kind("TIMESTAMPTZ"), Some(SqlType::Timestamp));
        assert_eq!(column_kind("JSONB"), None);
    }

    #[test]
    fn schema_splits_into_create_statements() {
        let stmts: Vec<&str> = schema_statements(SCHEMA).collect();
        assert!(stmts[0].starts_with("CREATE EXTENSION IF NOT EXISTS pgcrypto"));
        assert!(stmts.iter().all(|s| s.starts_with("CREATE ")));
        assert!(stmts
            .iter()
            .any(|s| s.starts_with("CREATE TABLE IF NOT EXISTS customers")));
        assert!(stmts
            .iter()
            .any(|s| s.starts_with("CREATE TABLE IF NOT EXISTS orders")));
    }

    #[test]
    fn schema_covers_every_mapped_order_column() {
        for column in [
            "customer_uuid",
            "weight_kg",
            "length_cm",
            "width_cm",
            "height_cm",
            "from_location",
            "to_location",
            "tags",
            "price",
            "available_from",
        ] {
            assert!(SCHEMA.contains(column), "schema is missing {column}");
        }
    }

    #[tokio::test]
    async fn cancelled_token_wins_over_pending_query() {
        // A lazy pool never connects until used; cancellation fires first.
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://gruz@127.0.0.1:1/gruz")
            .expect("lazy pool");
        let exec = PgExecutor::new(pool);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let stmt = Statement::new("SELECT COUNT(*) FROM orders o WHERE 1=1", vec![]);
        let err = exec.fetch_scalar(&stmt, &cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
