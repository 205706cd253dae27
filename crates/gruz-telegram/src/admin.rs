//! Admin bot: read-only views over customers and orders, gated by [`AdminPolicy`].

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use gruz_core::{
    formatting::{date, date_time, escape_html, money, weight},
    messaging::types::{Command, IncomingUpdate},
    model::{CustomerFilter, OrderFilter},
    security::AdminPolicy,
    service::Service,
};

const LIST_LIMIT: i64 = 20;

const MENU: &str = "🔧 Административная панель \"Грузы рядом\"

Доступные команды:
/customers - Список заказчиков
/orders - Список заказов
/stats - Статистика
/broadcast - Отправить сообщение всем пользователям
/help - Помощь";

const HELP: &str = "📋 Административные команды:

/start - Главное меню
/customers - Просмотр списка заказчиков
/orders - Просмотр списка заказов
/stats - Статистика системы
/broadcast - Массовая рассылка
/help - Показать эту справку";

const BROADCAST: &str = "📢 Массовая рассылка

Отправьте сообщение, которое будет разослано всем заказчикам.

Для отмены отправьте /cancel";

#[derive(Clone)]
pub struct AdminBot {
    service: Service,
    policy: AdminPolicy,
}

impl AdminBot {
    pub fn new(service: Service, policy: AdminPolicy) -> Self {
        Self { service, policy }
    }

    /// Only commands get a reply; plain text is ignored.
    pub async fn handle(&self, update: &IncomingUpdate, cancel: &CancellationToken) -> Option<String> {
        let IncomingUpdate::Command(cmd) = update else {
            return None;
        };

        if !self.policy.is_admin(Some(cmd.from.user_id)) {
            tracing::warn!(user = cmd.from.user_id.0, command = %cmd.name, "admin command denied");
            return Some(denial(cmd).to_string());
        }

        let reply = match cmd.name.as_str() {
            "start" => MENU.to_string(),
            "help" => HELP.to_string(),
            "customers" => self.customers(cancel).await,
            "orders" => self.orders(cancel).await,
            "stats" => self.stats(cancel).await,
            "broadcast" => BROADCAST.to_string(),
            "cancel" => "Рассылка отменена.".to_string(),
            _ => "Неизвестная команда. Используйте /help.".to_string(),
        };
        Some(reply)
    }

    async fn customers(&self, cancel: &CancellationToken) -> String {
        let filter = CustomerFilter::page(1, LIST_LIMIT);
        let page = match self.service.list_customers(&filter, cancel).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(error = %e, "admin customer listing failed");
                return "❌ Ошибка при получении списка заказчиков.".to_string();
            }
        };
        if page.items.is_empty() {
            return "📭 Заказчиков пока нет.".to_string();
        }

        let mut out = format!("👥 Заказчиков: {}", page.total);
        for (i, c) in page.items.iter().enumerate() {
            out.push_str(&format!(
                "\n\n{}. {}\n   📞 {}",
                i + 1,
                escape_html(&c.name),
                escape_html(&c.phone)
            ));
            if let Some(tag) = &c.telegram_tag {
                out.push_str(&format!("\n   📱 @{}", escape_html(tag)));
            }
            out.push_str(&format!("\n   📅 {}", date(&c.created_at)));
        }
        out
    }

    async fn orders(&self, cancel: &CancellationToken) -> String {
        let filter = OrderFilter::page(1, LIST_LIMIT);
        let page = match self.service.list_orders(&filter, cancel).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(error = %e, "admin order listing failed");
                return "❌ Ошибка при получении списка заказов.".to_string();
            }
        };
        if page.items.is_empty() {
            return "📦 Заказов пока нет.".to_string();
        }

        let mut out = format!("📦 Заказов: {}", page.total);
        for (i, o) in page.items.iter().enumerate() {
            out.push_str(&format!(
                "\n\n{}. {}\n   ⚖️ {} кг\n   💰 {} ₽",
                i + 1,
                escape_html(&o.title),
                weight(o.weight_kg),
                money(o.price)
            ));
            if let Some(from) = &o.from_location {
                out.push_str(&format!("\n   📍 Откуда: {}", escape_html(from)));
            }
            if let Some(to) = &o.to_location {
                out.push_str(&format!("\n   🎯 Куда: {}", escape_html(to)));
            }
            out.push_str(&format!("\n   📅 {}", date(&o.created_at)));
        }
        out
    }

    async fn stats(&self, cancel: &CancellationToken) -> String {
        match self.service.stats(cancel).await {
            Ok(stats) => format!(
                "📊 Статистика системы\n\n👥 Заказчиков: {}\n📦 Заказов: {}\n📅 Дата: {}",
                stats.customers,
                stats.orders,
                date_time(&Utc::now())
            ),
            Err(e) => {
                tracing::warn!(error = %e, "admin stats failed");
                "❌ Ошибка при получении статистики.".to_string()
            }
        }
    }
}

fn denial(cmd: &Command) -> &'static str {
    if cmd.name == "start" {
        "⛔ У вас нет доступа к административной панели."
    } else {
        "⛔ Доступ запрещен."
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use uuid::Uuid;

    use super::*;
    use gruz_core::{
        domain::{ChatId, UserId},
        messaging::types::{Sender, TextMessage},
        query::SqlValue,
        repository::Repository,
        testing::{rows, RecordingExecutor, Response},
    };

    const ADMIN: i64 = 500;

    fn sender(id: i64) -> Sender {
        Sender {
            user_id: UserId(id),
            username: None,
            first_name: "Админ".into(),
            last_name: None,
        }
    }

    fn command(user: i64, name: &str) -> IncomingUpdate {
        IncomingUpdate::Command(Command {
            chat_id: ChatId(user),
            from: sender(user),
            name: name.into(),
            args: String::new(),
        })
    }

    fn bot(exec: &Arc<RecordingExecutor>) -> AdminBot {
        AdminBot::new(
            Service::new(Repository::new(exec.clone())),
            AdminPolicy::new(vec![ADMIN]),
        )
    }

    async fn reply(bot: &AdminBot, update: IncomingUpdate) -> Option<String> {
        bot.handle(&update, &CancellationToken::new()).await
    }

    #[tokio::test]
    async fn strangers_are_denied_without_touching_the_store() {
        let exec = Arc::new(RecordingExecutor::new());
        let bot = bot(&exec);
        assert_eq!(
            reply(&bot, command(1, "start")).await.as_deref(),
            Some("⛔ У вас нет доступа к административной панели.")
        );
        for name in ["help", "customers", "orders", "stats", "broadcast"] {
            assert_eq!(
                reply(&bot, command(1, name)).await.as_deref(),
                Some("⛔ Доступ запрещен.")
            );
        }
        assert!(exec.statements().is_empty());
    }

    #[tokio::test]
    async fn empty_policy_denies_everyone() {
        let exec = Arc::new(RecordingExecutor::new());
        let bot = AdminBot::new(
            Service::new(Repository::new(exec.clone())),
            AdminPolicy::new(Vec::<i64>::new()),
        );
        let out = reply(&bot, command(ADMIN, "start")).await;
        assert!(out.is_some_and(|s| s.starts_with('⛔')));
    }

    #[tokio::test]
    async fn admin_sees_menu_and_broadcast_stub() {
        let exec = Arc::new(RecordingExecutor::new());
        let bot = bot(&exec);
        let menu = reply(&bot, command(ADMIN, "start")).await.unwrap();
        assert!(menu.contains("/customers"));
        let stub = reply(&bot, command(ADMIN, "broadcast")).await.unwrap();
        assert!(stub.starts_with("📢 Массовая рассылка"));
        assert!(stub.contains("/cancel"));
        let cancelled = reply(&bot, command(ADMIN, "cancel")).await.unwrap();
        assert_eq!(cancelled, "Рассылка отменена.");
    }

    #[tokio::test]
    async fn customers_listing_uses_page_of_twenty() {
        let exec = Arc::new(RecordingExecutor::with_responses([
            Response::Rows(vec![rows::customer(Uuid::from_u128(1), "ООО <Вектор>", None)]),
            Response::Scalar(1),
        ]));
        let out = reply(&bot(&exec), command(ADMIN, "customers")).await.unwrap();
        assert!(out.starts_with("👥 Заказчиков: 1"));
        assert!(out.contains("1. ООО &lt;Вектор&gt;"));
        assert!(out.contains("📞 +70000000000"));
        assert!(out.contains("📅 14.11.2023"));

        let stmt = &exec.statements()[0];
        let n = stmt.args.len();
        assert_eq!(stmt.args[n - 2], SqlValue::Int(20));
    }

    #[tokio::test]
    async fn orders_listing_renders_route() {
        let exec = Arc::new(RecordingExecutor::with_responses([
            Response::Rows(vec![rows::joined_order(
                Uuid::from_u128(1),
                Uuid::from_u128(2),
                "Диван",
                45.5,
                2500.0,
            )]),
            Response::Scalar(3),
        ]));
        let out = reply(&bot(&exec), command(ADMIN, "orders")).await.unwrap();
        assert!(out.starts_with("📦 Заказов: 3"));
        assert!(out.contains("⚖️ 45.5 кг"));
        assert!(out.contains("💰 2 500 ₽"));
        assert!(out.contains("📍 Откуда: Москва"));
        assert!(out.contains("🎯 Куда: Казань"));
    }

    #[tokio::test]
    async fn stats_counts_everything() {
        let exec = Arc::new(RecordingExecutor::with_responses([
            Response::Scalar(42),
            Response::Scalar(137),
        ]));
        let out = reply(&bot(&exec), command(ADMIN, "stats")).await.unwrap();
        assert!(out.contains("👥 Заказчиков: 42"));
        assert!(out.contains("📦 Заказов: 137"));
        assert!(exec
            .statements()
            .iter()
            .all(|s| s.sql.starts_with("SELECT COUNT(*)")));
    }

    #[tokio::test]
    async fn store_failure_is_reported() {
        let exec = Arc::new(RecordingExecutor::with_responses([Response::Fail("down".into())]));
        let out = reply(&bot(&exec), command(ADMIN, "orders")).await.unwrap();
        assert_eq!(out, "❌ Ошибка при получении списка заказов.");
    }

    #[tokio::test]
    async fn plain_text_is_ignored() {
        let exec = Arc::new(RecordingExecutor::new());
        let update = IncomingUpdate::Text(TextMessage {
            chat_id: ChatId(ADMIN),
            from: sender(ADMIN),
            text: "привет".into(),
        });
        assert_eq!(reply(&bot(&exec), update).await, None);
    }
}
