use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{mapper::Row, query::Statement, Result};

/// Hexagonal port for running parameterized statements.
///
/// The core never talks to a database driver directly; the Postgres adapter
/// implements this over a connection pool. Implementations must stop waiting
/// and return [`crate::Error::Cancelled`] once `cancel` fires.
#[async_trait]
pub trait StatementExecutor: Send + Sync {
    /// Run a statement and decode every returned row.
    async fn fetch_all(&self, stmt: &Statement, cancel: &CancellationToken) -> Result<Vec<Row>>;

    /// Run a statement expected to return at most one row.
    async fn fetch_optional(
        &self,
        stmt: &Statement,
        cancel: &CancellationToken,
    ) -> Result<Option<Row>>;

    /// Run a statement returning a single integer (e.g. `COUNT(*)`).
    async fn fetch_scalar(&self, stmt: &Statement, cancel: &CancellationToken) -> Result<i64>;
}
