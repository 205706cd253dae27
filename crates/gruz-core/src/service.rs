//! Application service: the one entry point transports talk to.

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    errors::Error,
    model::{
        CreateCustomerInput, CreateOrderInput, Customer, CustomerFilter, Order, OrderFilter, Page,
        Stats, UpdateCustomerInput, UpdateOrderInput,
    },
    repository::Repository,
    Result,
};

/// Telegram account details used to register a customer on first contact.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TelegramProfile {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl TelegramProfile {
    pub fn display_name(&self) -> String {
        match self.last_name.as_deref().map(str::trim) {
            Some(last) if !last.is_empty() => format!("{} {last}", self.first_name.trim()),
            _ => self.first_name.trim().to_string(),
        }
    }
}

#[derive(Clone)]
pub struct Service {
    repo: Repository,
}

impl Service {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    pub async fn list_orders(
        &self,
        filter: &OrderFilter,
        cancel: &CancellationToken,
    ) -> Result<Page<Order>> {
        self.repo.list_orders(filter, cancel).await
    }

    pub async fn create_order(
        &self,
        input: &CreateOrderInput,
        cancel: &CancellationToken,
    ) -> Result<Order> {
        validate_order(input)?;
        self.repo.create_order(input, cancel).await
    }

    /// `id` is the textual uuid as received from a transport.
    pub async fn update_order(
        &self,
        id: &str,
        input: &UpdateOrderInput,
        cancel: &CancellationToken,
    ) -> Result<Option<Order>> {
        let id = parse_id(id)?;
        self.repo.update_order(id, input, cancel).await
    }

    pub async fn list_customers(
        &self,
        filter: &CustomerFilter,
        cancel: &CancellationToken,
    ) -> Result<Page<Customer>> {
        self.repo.list_customers(filter, cancel).await
    }

    pub async fn create_customer(
        &self,
        input: &CreateCustomerInput,
        cancel: &CancellationToken,
    ) -> Result<Customer> {
        if input.name.trim().is_empty() {
            return Err(Error::InvalidInput("customer name is empty".to_string()));
        }
        self.repo.create_customer(input, cancel).await
    }

    pub async fn update_customer(
        &self,
        id: &str,
        input: &UpdateCustomerInput,
        cancel: &CancellationToken,
    ) -> Result<Option<Customer>> {
        let id = parse_id(id)?;
        self.repo.update_customer(id, input, cancel).await
    }

    pub async fn customer_by_telegram_id(
        &self,
        telegram_id: i64,
        cancel: &CancellationToken,
    ) -> Result<Option<Customer>> {
        self.repo.customer_by_telegram_id(telegram_id, cancel).await
    }

    /// Find the customer linked to this Telegram account, creating one if absent.
    ///
    /// Returns the customer and whether it was created by this call.
    pub async fn register_telegram_user(
        &self,
        profile: &TelegramProfile,
        cancel: &CancellationToken,
    ) -> Result<(Customer, bool)> {
        if let Some(existing) = self.repo.customer_by_telegram_id(profile.id, cancel).await? {
            return Ok((existing, false));
        }

        let mut name = profile.display_name();
        if name.is_empty() {
            name = profile
                .username
                .clone()
                .unwrap_or_else(|| format!("user{}", profile.id));
        }
        let input = CreateCustomerInput {
            name,
            phone: String::new(),
            telegram_id: Some(profile.id),
            telegram_tag: profile.username.clone().filter(|u| !u.is_empty()),
        };
        let created = self.repo.create_customer(&input, cancel).await?;
        tracing::info!(customer = %created.id, telegram_id = profile.id, "registered telegram user");
        Ok((created, true))
    }

    /// Total customers and orders, counted independently of any page.
    pub async fn stats(&self, cancel: &CancellationToken) -> Result<Stats> {
        let customers = self.repo.count_customers(cancel).await?;
        let orders = self.repo.count_orders(cancel).await?;
        Ok(Stats { customers, orders })
    }
}

pub fn parse_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| Error::InvalidId(raw.to_string()))
}

fn validate_order(input: &CreateOrderInput) -> Result<()> {
    if input.title.trim().is_empty() {
        return Err(Error::InvalidInput("order title is empty".to_string()));
    }
    if !(input.weight_kg.is_finite() && input.weight_kg > 0.0) {
        return Err(Error::InvalidInput(format!(
            "weight must be positive, got {}",
            input.weight_kg
        )));
    }
    if !(input.price.is_finite() && input.price >= 0.0) {
        return Err(Error::InvalidInput(format!(
            "price must not be negative, got {}",
            input.price
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        query::SqlValue,
        testing::{rows, RecordingExecutor, Response},
    };

    fn service(exec: &Arc<RecordingExecutor>) -> Service {
        Service::new(Repository::new(exec.clone()))
    }

    fn order_input() -> CreateOrderInput {
        CreateOrderInput {
            customer_id: Uuid::from_u128(9),
            title: "Перевезти холодильник".into(),
            description: None,
            weight_kg: 70.0,
            length_cm: None,
            width_cm: None,
            height_cm: None,
            from_location: Some("Москва".into()),
            to_location: Some("Казань".into()),
            tags: vec![],
            price: 5000.0,
            available_from: None,
        }
    }

    #[tokio::test]
    async fn malformed_id_is_rejected_before_the_store() {
        let exec = Arc::new(RecordingExecutor::new());
        let input = UpdateOrderInput {
            price: Some(1.0),
            ..Default::default()
        };
        let err = service(&exec)
            .update_order("not-a-uuid", &input, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidId(ref s) if s == "not-a-uuid"));
        assert!(exec.statements().is_empty());
    }

    #[tokio::test]
    async fn stats_counts_every_row_not_one_page() {
        let exec = Arc::new(RecordingExecutor::with_responses([
            Response::Scalar(42),
            Response::Scalar(137),
        ]));
        let stats = service(&exec).stats(&CancellationToken::new()).await.unwrap();
        assert_eq!(
            stats,
            Stats {
                customers: 42,
                orders: 137
            }
        );
        for stmt in exec.statements() {
            assert!(stmt.sql.starts_with("SELECT COUNT(*)"));
            assert!(!stmt.sql.contains("LIMIT"));
        }
    }

    #[tokio::test]
    async fn register_reuses_existing_customer() {
        let id = Uuid::from_u128(5);
        let exec = Arc::new(RecordingExecutor::with_responses([Response::Row(Some(
            rows::customer(id, "Иван", Some(77)),
        ))]));
        let profile = TelegramProfile {
            id: 77,
            first_name: "Иван".into(),
            ..Default::default()
        };
        let (customer, created) = service(&exec)
            .register_telegram_user(&profile, &CancellationToken::new())
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(customer.id, id);
        assert_eq!(exec.statements().len(), 1);
    }

    #[tokio::test]
    async fn register_creates_missing_customer() {
        let id = Uuid::from_u128(6);
        let exec = Arc::new(RecordingExecutor::with_responses([
            Response::Row(None),
            Response::Row(Some(rows::customer(id, "Анна Смирнова", Some(88)))),
        ]));
        let profile = TelegramProfile {
            id: 88,
            first_name: "Анна".into(),
            last_name: Some("Смирнова".into()),
            username: Some("anna".into()),
        };
        let (_, created) = service(&exec)
            .register_telegram_user(&profile, &CancellationToken::new())
            .await
            .unwrap();
        assert!(created);

        let insert = &exec.statements()[1];
        assert!(insert.sql.starts_with("INSERT INTO customers"));
        assert_eq!(insert.args[0], SqlValue::Text("Анна Смирнова".into()));
        assert_eq!(insert.args[2], SqlValue::Int(88));
        assert_eq!(insert.args[3], SqlValue::Text("anna".into()));
    }

    #[tokio::test]
    async fn non_positive_weight_is_invalid_input() {
        let exec = Arc::new(RecordingExecutor::new());
        let mut input = order_input();
        input.weight_kg = 0.0;
        let err = service(&exec)
            .create_order(&input, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_caller_error());
        assert!(exec.statements().is_empty());
    }

    #[tokio::test]
    async fn create_order_inserts_twelve_values() {
        let exec = Arc::new(RecordingExecutor::with_responses([Response::Row(Some(
            rows::order(Uuid::from_u128(1), Uuid::from_u128(9), "Перевезти холодильник", 70.0, 5000.0),
        ))]));
        let order = service(&exec)
            .create_order(&order_input(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(order.weight_kg, 70.0);
        assert_eq!(exec.statements()[0].args.len(), 12);
    }

    #[test]
    fn display_name_skips_blank_last_name() {
        let p = TelegramProfile {
            id: 1,
            first_name: "Олег".into(),
            last_name: Some(" ".into()),
            username: None,
        };
        assert_eq!(p.display_name(), "Олег");
    }
}
