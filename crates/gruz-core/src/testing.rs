//! In-memory [`StatementExecutor`] for tests.
//!
//! Records every statement it is asked to run and answers from a FIFO queue of
//! canned responses, so tests can assert both the SQL that was issued and how
//! the caller handled the result.

use std::{collections::VecDeque, sync::Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    domain::ChatId, errors::Error, mapper::Row, messaging::port::MessagingPort,
    ports::StatementExecutor, query::Statement, Result,
};

#[derive(Clone, Debug)]
pub enum Response {
    Rows(Vec<Row>),
    Row(Option<Row>),
    Scalar(i64),
    Fail(String),
}

#[derive(Default)]
pub struct RecordingExecutor {
    responses: Mutex<VecDeque<Response>>,
    statements: Mutex<Vec<Statement>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_responses(responses: impl IntoIterator<Item = Response>) -> Self {
        let exec = Self::new();
        for r in responses {
            exec.push(r);
        }
        exec
    }

    pub fn push(&self, response: Response) {
        self.responses
            .lock()
            .expect("responses lock")
            .push_back(response);
    }

    /// Statements issued so far, in order.
    pub fn statements(&self) -> Vec<Statement> {
        self.statements.lock().expect("statements lock").clone()
    }

    fn next(&self, stmt: &Statement, cancel: &CancellationToken) -> Result<Response> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.statements
            .lock()
            .expect("statements lock")
            .push(stmt.clone());
        let resp = self
            .responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .ok_or_else(|| Error::Database(format!("no canned response for: {}", stmt.sql)))?;
        match resp {
            Response::Fail(msg) => Err(Error::Database(msg)),
            other => Ok(other),
        }
    }
}

#[async_trait]
impl StatementExecutor for RecordingExecutor {
    async fn fetch_all(&self, stmt: &Statement, cancel: &CancellationToken) -> Result<Vec<Row>> {
        match self.next(stmt, cancel)? {
            Response::Rows(rows) => Ok(rows),
            Response::Row(row) => Ok(row.into_iter().collect()),
            other => Err(Error::Database(format!("expected rows, queued {other:?}"))),
        }
    }

    async fn fetch_optional(
        &self,
        stmt: &Statement,
        cancel: &CancellationToken,
    ) -> Result<Option<Row>> {
        match self.next(stmt, cancel)? {
            Response::Row(row) => Ok(row),
            Response::Rows(rows) => Ok(rows.into_iter().next()),
            other => Err(Error::Database(format!("expected a row, queued {other:?}"))),
        }
    }

    async fn fetch_scalar(&self, stmt: &Statement, cancel: &CancellationToken) -> Result<i64> {
        match self.next(stmt, cancel)? {
            Response::Scalar(n) => Ok(n),
            other => Err(Error::Database(format!("expected a scalar, queued {other:?}"))),
        }
    }
}

/// [`MessagingPort`] that keeps every outgoing message.
#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<(ChatId, String)>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(ChatId, String)> {
        self.sent.lock().expect("sent lock").clone()
    }
}

#[async_trait]
impl MessagingPort for RecordingMessenger {
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<()> {
        self.sent
            .lock()
            .expect("sent lock")
            .push((chat_id, html.to_string()));
        Ok(())
    }
}

/// Row builders matching the repository's column order.
pub mod rows {
    use chrono::{DateTime, TimeZone, Utc};
    use uuid::Uuid;

    use crate::{
        mapper::Row,
        query::{SqlType, SqlValue},
    };

    pub fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    pub fn customer_values(id: Uuid, name: &str, telegram_id: Option<i64>) -> Vec<SqlValue> {
        vec![
            SqlValue::Uuid(id),
            SqlValue::Text(name.to_string()),
            SqlValue::Text("+70000000000".to_string()),
            telegram_id.into(),
            SqlValue::Null(SqlType::Text),
            SqlValue::Timestamp(at(1_700_000_000)),
        ]
    }

    pub fn customer(id: Uuid, name: &str, telegram_id: Option<i64>) -> Row {
        Row::new(customer_values(id, name, telegram_id))
    }

    pub fn order_values(id: Uuid, customer_id: Uuid, title: &str, weight: f64, price: f64) -> Vec<SqlValue> {
        vec![
            SqlValue::Uuid(id),
            SqlValue::Uuid(customer_id),
            SqlValue::Text(title.to_string()),
            SqlValue::Null(SqlType::Text),
            SqlValue::Float(weight),
            SqlValue::Null(SqlType::Float),
            SqlValue::Null(SqlType::Float),
            SqlValue::Null(SqlType::Float),
            SqlValue::Text("Москва".to_string()),
            SqlValue::Text("Казань".to_string()),
            SqlValue::TextArray(vec!["fragile".to_string()]),
            SqlValue::Float(price),
            SqlValue::Null(SqlType::Timestamp),
            SqlValue::Timestamp(at(1_700_000_500)),
        ]
    }

    pub fn order(id: Uuid, customer_id: Uuid, title: &str, weight: f64, price: f64) -> Row {
        Row::new(order_values(id, customer_id, title, weight, price))
    }

    /// Order row joined with its customer, as produced by the listing query.
    pub fn joined_order(id: Uuid, customer_id: Uuid, title: &str, weight: f64, price: f64) -> Row {
        let mut values = order_values(id, customer_id, title, weight, price);
        values.extend(customer_values(customer_id, "Заказчик", None));
        Row::new(values)
    }
}
