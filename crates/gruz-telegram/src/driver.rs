//! Driver-facing bot: browse orders, create orders step by step, view profile.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use gruz_core::{
    conversation::{ConversationState, ConversationStore, InputError, OrderDraft, Step},
    formatting::{escape_html, money, weight},
    messaging::types::{Command, IncomingUpdate, Sender, TextMessage},
    model::{Order, OrderFilter},
    service::Service,
};

const ORDERS_PAGE_LIMIT: i64 = 10;

const WELCOME: &str = "🚛 Добро пожаловать в \"Грузы рядом\"!

Доступные команды:
/orders - Посмотреть доступные заказы
/create_order - Создать новый заказ
/profile - Ваш профиль
/help - Помощь";

const HELP: &str = "📋 Помощь по командам:

/start - Начать работу с ботом
/orders - Посмотреть доступные заказы
/create_order - Создать новый заказ
/cancel - Отменить создание заказа
/profile - Ваш профиль
/help - Показать эту справку

Для создания заказа используйте команду /create_order и следуйте инструкциям.";

#[derive(Clone)]
pub struct DriverBot {
    service: Service,
    conversations: Arc<ConversationStore>,
}

impl DriverBot {
    pub fn new(service: Service, conversations: Arc<ConversationStore>) -> Self {
        Self {
            service,
            conversations,
        }
    }

    /// HTML reply for one update, if any.
    pub async fn handle(&self, update: &IncomingUpdate, cancel: &CancellationToken) -> Option<String> {
        match update {
            IncomingUpdate::Command(cmd) => Some(self.command(update, cmd, cancel).await),
            IncomingUpdate::Text(msg) => Some(self.text(update, msg, cancel).await),
        }
    }

    async fn command(&self, update: &IncomingUpdate, cmd: &Command, cancel: &CancellationToken) -> String {
        match cmd.name.as_str() {
            "start" => self.start(&cmd.from, cancel).await,
            "help" => HELP.to_string(),
            "orders" => self.orders(cancel).await,
            "create_order" => {
                let state = self.conversations.start(update.conversation_key()).await;
                format!(
                    "📝 Создание нового заказа\n\nОтвечайте на вопросы по одному. Для отмены отправьте /cancel.\n\n{}",
                    prompt(state)
                )
            }
            "cancel" => {
                if self.conversations.cancel(update.conversation_key()).await {
                    "Создание заказа отменено.".to_string()
                } else {
                    "Нечего отменять.".to_string()
                }
            }
            "profile" => self.profile(&cmd.from, cancel).await,
            _ => "Неизвестная команда. Используйте /help.".to_string(),
        }
    }

    async fn start(&self, from: &Sender, cancel: &CancellationToken) -> String {
        match self.service.register_telegram_user(&from.profile(), cancel).await {
            Ok(_) => WELCOME.to_string(),
            Err(e) => {
                tracing::warn!(user = from.user_id.0, error = %e, "driver registration failed");
                "Произошла ошибка при проверке профиля.".to_string()
            }
        }
    }

    async fn orders(&self, cancel: &CancellationToken) -> String {
        let filter = OrderFilter::page(1, ORDERS_PAGE_LIMIT);
        let page = match self.service.list_orders(&filter, cancel).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(error = %e, "driver order listing failed");
                return "Произошла ошибка при получении заказов.".to_string();
            }
        };
        if page.items.is_empty() {
            return "Пока нет доступных заказов.".to_string();
        }

        let mut out = format!("📦 Найдено заказов: {}", page.total);
        for (i, order) in page.items.iter().enumerate() {
            out.push_str("\n\n");
            out.push_str(&order_entry(i + 1, order));
        }
        out
    }

    async fn profile(&self, from: &Sender, cancel: &CancellationToken) -> String {
        let customer = match self.service.customer_by_telegram_id(from.user_id.0, cancel).await {
            Ok(Some(c)) => c,
            Ok(None) => {
                return "Профиль не найден. Используйте /start для создания профиля.".to_string()
            }
            Err(e) => {
                tracing::warn!(user = from.user_id.0, error = %e, "profile lookup failed");
                return "Произошла ошибка при получении профиля.".to_string();
            }
        };

        let phone = if customer.phone.is_empty() {
            "не указан".to_string()
        } else {
            escape_html(&customer.phone)
        };
        let mut out = format!(
            "👤 Ваш профиль:\n\nИмя: {}\nТелефон: {phone}",
            escape_html(&customer.name)
        );
        if let Some(tag) = &customer.telegram_tag {
            out.push_str(&format!("\nTelegram: @{}", escape_html(tag)));
        }
        out
    }

    async fn text(&self, update: &IncomingUpdate, msg: &TextMessage, cancel: &CancellationToken) -> String {
        let Some(step) = self.conversations.feed(update.conversation_key(), &msg.text).await else {
            return "Чтобы создать заказ, используйте /create_order.".to_string();
        };

        match step {
            Step::Next(state) => prompt(state).to_string(),
            Step::Retry(reason) => format!("⚠️ {}", retry_reason(reason)),
            Step::Done(draft) => self.finish(&msg.from, draft, cancel).await,
        }
    }

    async fn finish(&self, from: &Sender, draft: OrderDraft, cancel: &CancellationToken) -> String {
        let created = async {
            let (customer, _) = self.service.register_telegram_user(&from.profile(), cancel).await?;
            let input = draft.into_input(customer.id)?;
            self.service.create_order(&input, cancel).await
        }
        .await;

        match created {
            Ok(order) => {
                tracing::info!(order = %order.id, user = from.user_id.0, "order created via bot");
                format!("✅ Заказ создан!\n\n{}", order_entry(1, &order))
            }
            Err(e) => {
                tracing::warn!(user = from.user_id.0, error = %e, "order creation failed");
                "Произошла ошибка при создании заказа.".to_string()
            }
        }
    }
}

pub fn prompt(state: ConversationState) -> &'static str {
    match state {
        ConversationState::AwaitingTitle => "Введите название заказа:",
        ConversationState::AwaitingWeight => "Укажите вес груза (кг):",
        ConversationState::AwaitingPrice => "Укажите цену (₽):",
        ConversationState::AwaitingFrom => "Откуда забрать груз?",
        ConversationState::AwaitingTo => "Куда доставить груз?",
        ConversationState::AwaitingDescription => {
            "Добавьте описание (или отправьте «-», чтобы пропустить):"
        }
    }
}

fn retry_reason(reason: InputError) -> &'static str {
    match reason {
        InputError::Empty => "Ответ не должен быть пустым.",
        InputError::TooLong => "Слишком длинный ответ.",
        InputError::NotANumber => "Не удалось распознать число. Пример: 70 или 12,5",
        InputError::NotPositive => "Значение должно быть больше нуля.",
        InputError::Negative => "Значение не может быть отрицательным.",
    }
}

fn order_entry(n: usize, order: &Order) -> String {
    let mut out = format!(
        "{n}. <b>{}</b>\n   Вес: {} кг\n   Цена: {} ₽",
        escape_html(&order.title),
        weight(order.weight_kg),
        money(order.price)
    );
    if let Some(from) = &order.from_location {
        out.push_str(&format!("\n   Откуда: {}", escape_html(from)));
    }
    if let Some(to) = &order.to_location {
        out.push_str(&format!("\n   Куда: {}", escape_html(to)));
    }
    if let Some(desc) = &order.description {
        out.push_str(&format!("\n   {}", escape_html(desc)));
    }
    out
}
