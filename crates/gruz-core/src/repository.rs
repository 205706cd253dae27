//! Statement execution for orders and customers.
//!
//! The repository owns no SQL engine: it builds statements (via the filter and
//! update builders), hands them to a [`StatementExecutor`], and maps the rows.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    errors::Error,
    mapper::Row,
    model::{
        CreateCustomerInput, CreateOrderInput, Customer, CustomerFilter, Order, OrderFilter, Page,
        UpdateCustomerInput, UpdateOrderInput,
    },
    ports::StatementExecutor,
    query::{SqlValue, Statement},
    Result,
};

const ORDER_RETURNING: &str = "uuid, customer_uuid, title, description, weight_kg, length_cm, \
width_cm, height_cm, from_location, to_location, tags, price, available_from, created_at";

const CUSTOMER_RETURNING: &str = "uuid, name, phone, telegram_id, telegram_tag, created_at";

#[derive(Clone)]
pub struct Repository {
    exec: Arc<dyn StatementExecutor>,
}

impl Repository {
    pub fn new(exec: Arc<dyn StatementExecutor>) -> Self {
        Self { exec }
    }

    pub async fn list_orders(
        &self,
        filter: &OrderFilter,
        cancel: &CancellationToken,
    ) -> Result<Page<Order>> {
        let stmts = filter.statements();
        tracing::debug!(sql = %stmts.rows.sql, args = stmts.rows.args.len(), "listing orders");

        let rows = self.exec.fetch_all(&stmts.rows, cancel).await?;
        let items = rows
            .iter()
            .map(Order::from_joined_row)
            .collect::<Result<Vec<_>>>()?;
        let total = self.exec.fetch_scalar(&stmts.count, cancel).await?;

        Ok(Page {
            items,
            total,
            page: stmts.pagination.page,
            limit: stmts.pagination.limit,
        })
    }

    pub async fn count_orders(&self, cancel: &CancellationToken) -> Result<i64> {
        let count = OrderFilter::default().statements().count;
        self.exec.fetch_scalar(&count, cancel).await
    }

    pub async fn create_order(
        &self,
        input: &CreateOrderInput,
        cancel: &CancellationToken,
    ) -> Result<Order> {
        let stmt = Statement::new(
            format!(
                "INSERT INTO orders (customer_uuid, title, description, weight_kg, length_cm, \
width_cm, height_cm, from_location, to_location, tags, price, available_from) \
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING {ORDER_RETURNING}"
            ),
            vec![
                SqlValue::Uuid(input.customer_id),
                SqlValue::Text(input.title.clone()),
                input.description.clone().into(),
                SqlValue::Float(input.weight_kg),
                input.length_cm.into(),
                input.width_cm.into(),
                input.height_cm.into(),
                input.from_location.clone().into(),
                input.to_location.clone().into(),
                SqlValue::TextArray(input.tags.clone()),
                SqlValue::Float(input.price),
                input.available_from.into(),
            ],
        );
        let row = self.returning_row(&stmt, cancel, "insert order").await?;
        Order::from_row(&row)
    }

    /// Returns `Ok(None)` when no order has this id.
    pub async fn update_order(
        &self,
        id: Uuid,
        input: &UpdateOrderInput,
        cancel: &CancellationToken,
    ) -> Result<Option<Order>> {
        let stmt = input
            .to_update_set()
            .build("orders", "uuid", id, ORDER_RETURNING)?;
        tracing::debug!(sql = %stmt.sql, "updating order");
        self.exec
            .fetch_optional(&stmt, cancel)
            .await?
            .map(|row| Order::from_row(&row))
            .transpose()
    }

    pub async fn list_customers(
        &self,
        filter: &CustomerFilter,
        cancel: &CancellationToken,
    ) -> Result<Page<Customer>> {
        let stmts = filter.statements();
        tracing::debug!(sql = %stmts.rows.sql, args = stmts.rows.args.len(), "listing customers");

        let rows = self.exec.fetch_all(&stmts.rows, cancel).await?;
        let items = rows
            .iter()
            .map(Customer::from_row)
            .collect::<Result<Vec<_>>>()?;
        let total = self.exec.fetch_scalar(&stmts.count, cancel).await?;

        Ok(Page {
            items,
            total,
            page: stmts.pagination.page,
            limit: stmts.pagination.limit,
        })
    }

    pub async fn count_customers(&self, cancel: &CancellationToken) -> Result<i64> {
        let count = CustomerFilter::default().statements().count;
        self.exec.fetch_scalar(&count, cancel).await
    }

    pub async fn create_customer(
        &self,
        input: &CreateCustomerInput,
        cancel: &CancellationToken,
    ) -> Result<Customer> {
        let stmt = Statement::new(
            format!(
                "INSERT INTO customers (name, phone, telegram_id, telegram_tag) \
VALUES ($1, $2, $3, $4) RETURNING {CUSTOMER_RETURNING}"
            ),
            vec![
                SqlValue::Text(input.name.clone()),
                SqlValue::Text(input.phone.clone()),
                input.telegram_id.into(),
                input.telegram_tag.clone().into(),
            ],
        );
        let row = self.returning_row(&stmt, cancel, "insert customer").await?;
        Customer::from_row(&row)
    }

    /// Returns `Ok(None)` when no customer has this id.
    pub async fn update_customer(
        &self,
        id: Uuid,
        input: &UpdateCustomerInput,
        cancel: &CancellationToken,
    ) -> Result<Option<Customer>> {
        let stmt = input
            .to_update_set()
            .build("customers", "uuid", id, CUSTOMER_RETURNING)?;
        tracing::debug!(sql = %stmt.sql, "updating customer");
        self.exec
            .fetch_optional(&stmt, cancel)
            .await?
            .map(|row| Customer::from_row(&row))
            .transpose()
    }

    /// An unknown telegram id is `Ok(None)`, not an error.
    pub async fn customer_by_telegram_id(
        &self,
        telegram_id: i64,
        cancel: &CancellationToken,
    ) -> Result<Option<Customer>> {
        let stmt = Statement::new(
            format!("SELECT {CUSTOMER_RETURNING} FROM customers WHERE telegram_id = $1"),
            vec![SqlValue::Int(telegram_id)],
        );
        self.exec
            .fetch_optional(&stmt, cancel)
            .await?
            .map(|row| Customer::from_row(&row))
            .transpose()
    }

    async fn returning_row(
        &self,
        stmt: &Statement,
        cancel: &CancellationToken,
        what: &str,
    ) -> Result<Row> {
        tracing::debug!(sql = %stmt.sql, "{what}");
        self.exec
            .fetch_optional(stmt, cancel)
            .await?
            .ok_or_else(|| Error::Database(format!("{what}: no row returned")))
    }
}
