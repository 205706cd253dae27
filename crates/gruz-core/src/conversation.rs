//! Step-by-step order creation over chat.
//!
//! [`advance`] is the pure state machine; [`ConversationStore`] keeps one
//! in-flight draft per (chat, user) and forgets drafts idle longer than its TTL.

use std::{
    collections::HashMap,
    sync::OnceLock,
    time::{Duration, Instant},
};

use regex::Regex;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{domain::ConversationKey, errors::Error, model::CreateOrderInput, Result};

const MAX_TEXT_LEN: usize = 200;

/// What the bot is waiting for next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversationState {
    AwaitingTitle,
    AwaitingWeight,
    AwaitingPrice,
    AwaitingFrom,
    AwaitingTo,
    AwaitingDescription,
}

/// Why an answer was not accepted; the state does not change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputError {
    Empty,
    TooLong,
    NotANumber,
    NotPositive,
    Negative,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    Next(ConversationState),
    Retry(InputError),
    Done(OrderDraft),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderDraft {
    pub title: Option<String>,
    pub weight_kg: Option<f64>,
    pub price: Option<f64>,
    pub from_location: Option<String>,
    pub to_location: Option<String>,
    pub description: Option<String>,
}

impl OrderDraft {
    pub fn into_input(self, customer_id: Uuid) -> Result<CreateOrderInput> {
        let missing = |field: &str| Error::InvalidInput(format!("order draft is missing {field}"));
        Ok(CreateOrderInput {
            customer_id,
            title: self.title.ok_or_else(|| missing("title"))?,
            description: self.description,
            weight_kg: self.weight_kg.ok_or_else(|| missing("weight"))?,
            length_cm: None,
            width_cm: None,
            height_cm: None,
            from_location: self.from_location,
            to_location: self.to_location,
            tags: Vec::new(),
            price: self.price.ok_or_else(|| missing("price"))?,
            available_from: None,
        })
    }
}

/// Apply one user answer to the draft.
pub fn advance(state: ConversationState, draft: &mut OrderDraft, input: &str) -> Step {
    use ConversationState::*;

    let text = input.trim();
    match state {
        AwaitingTitle => match required_text(text) {
            Ok(t) => {
                draft.title = Some(t);
                Step::Next(AwaitingWeight)
            }
            Err(e) => Step::Retry(e),
        },
        AwaitingWeight => match positive_number(text) {
            Ok(w) => {
                draft.weight_kg = Some(w);
                Step::Next(AwaitingPrice)
            }
            Err(e) => Step::Retry(e),
        },
        AwaitingPrice => match non_negative_number(text) {
            Ok(p) => {
                draft.price = Some(p);
                Step::Next(AwaitingFrom)
            }
            Err(e) => Step::Retry(e),
        },
        AwaitingFrom => match required_text(text) {
            Ok(t) => {
                draft.from_location = Some(t);
                Step::Next(AwaitingTo)
            }
            Err(e) => Step::Retry(e),
        },
        AwaitingTo => match required_text(text) {
            Ok(t) => {
                draft.to_location = Some(t);
                Step::Next(AwaitingDescription)
            }
            Err(e) => Step::Retry(e),
        },
        AwaitingDescription => {
            if text == "-" || text.is_empty() {
                draft.description = None;
            } else if text.chars().count() > MAX_TEXT_LEN * 5 {
                return Step::Retry(InputError::TooLong);
            } else {
                draft.description = Some(text.to_string());
            }
            Step::Done(draft.clone())
        }
    }
}

fn required_text(text: &str) -> std::result::Result<String, InputError> {
    if text.is_empty() {
        return Err(InputError::Empty);
    }
    if text.chars().count() > MAX_TEXT_LEN {
        return Err(InputError::TooLong);
    }
    Ok(text.to_string())
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // "70", "70,5", "5 000 ₽", "70 кг"
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(-?\d[\d\s]*(?:[.,]\d+)?)\s*(?:кг|kg|₽|руб\.?|р\.?|rub)?$")
            .expect("valid regex")
    })
}

/// Parse a strictly positive amount; comma and dot both work as decimal separators.
pub fn positive_number(text: &str) -> std::result::Result<f64, InputError> {
    let value = amount(text)?;
    if value <= 0.0 {
        return Err(InputError::NotPositive);
    }
    Ok(value)
}

/// Like [`positive_number`], but zero is allowed (free orders).
pub fn non_negative_number(text: &str) -> std::result::Result<f64, InputError> {
    let value = amount(text)?;
    if value < 0.0 {
        return Err(InputError::Negative);
    }
    Ok(value)
}

fn amount(text: &str) -> std::result::Result<f64, InputError> {
    if text.is_empty() {
        return Err(InputError::Empty);
    }
    let caps = number_re()
        .captures(text)
        .ok_or(InputError::NotANumber)?;
    let digits: String = caps[1]
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    match digits.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(InputError::NotANumber),
    }
}

#[derive(Clone, Debug)]
struct Conversation {
    state: ConversationState,
    draft: OrderDraft,
    touched: Instant,
}

/// In-flight drafts keyed by (chat, user).
#[derive(Debug)]
pub struct ConversationStore {
    ttl: Duration,
    inner: Mutex<HashMap<ConversationKey, Conversation>>,
}

impl ConversationStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Start (or restart) a conversation; any previous draft is discarded.
    pub async fn start(&self, key: ConversationKey) -> ConversationState {
        self.start_at(key, Instant::now()).await
    }

    pub async fn start_at(&self, key: ConversationKey, now: Instant) -> ConversationState {
        let state = ConversationState::AwaitingTitle;
        self.inner.lock().await.insert(
            key,
            Conversation {
                state,
                draft: OrderDraft::default(),
                touched: now,
            },
        );
        state
    }

    /// Returns whether a conversation was active.
    pub async fn cancel(&self, key: ConversationKey) -> bool {
        self.inner.lock().await.remove(&key).is_some()
    }

    pub async fn is_active(&self, key: ConversationKey) -> bool {
        self.is_active_at(key, Instant::now()).await
    }

    pub async fn is_active_at(&self, key: ConversationKey, now: Instant) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.get(&key) {
            Some(c) if self.expired(c, now) => {
                inner.remove(&key);
                false
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Feed one message. `None` means there is no live conversation for `key`.
    ///
    /// A finished draft is removed from the store and handed back in [`Step::Done`].
    pub async fn feed(&self, key: ConversationKey, text: &str) -> Option<Step> {
        self.feed_at(key, text, Instant::now()).await
    }

    pub async fn feed_at(&self, key: ConversationKey, text: &str, now: Instant) -> Option<Step> {
        let mut inner = self.inner.lock().await;
        let conv = inner.get_mut(&key)?;
        if self.expired(conv, now) {
            inner.remove(&key);
            return None;
        }

        conv.touched = now;
        let step = advance(conv.state, &mut conv.draft, text);
        if let Step::Next(state) = &step {
            conv.state = *state;
        }
        if matches!(step, Step::Done(_)) {
            inner.remove(&key);
        }
        Some(step)
    }

    /// Drop idle conversations; returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now()).await
    }

    pub async fn purge_expired_at(&self, now: Instant) -> usize {
        let mut inner = self.inner.lock().await;
        let before = inner.len();
        inner.retain(|_, c| now.saturating_duration_since(c.touched) <= self.ttl);
        before - inner.len()
    }

    fn expired(&self, conv: &Conversation, now: Instant) -> bool {
        now.saturating_duration_since(conv.touched) > self.ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChatId, UserId};

    fn key(user: i64) -> ConversationKey {
        ConversationKey::new(ChatId(100), UserId(user))
    }

    #[test]
    fn numbers_accept_comma_and_units() {
        assert_eq!(positive_number("70"), Ok(70.0));
        assert_eq!(positive_number("70,5"), Ok(70.5));
        assert_eq!(positive_number("5 000 ₽"), Ok(5000.0));
        assert_eq!(positive_number("12.5 кг"), Ok(12.5));
        assert_eq!(positive_number("0"), Err(InputError::NotPositive));
        assert_eq!(positive_number("-3"), Err(InputError::NotPositive));
        assert_eq!(positive_number("много"), Err(InputError::NotANumber));
        assert_eq!(positive_number(""), Err(InputError::Empty));
    }

    #[test]
    fn overflowing_digits_are_not_a_number() {
        let huge = "9".repeat(400);
        assert_eq!(positive_number(&huge), Err(InputError::NotANumber));
        assert_eq!(non_negative_number(&huge), Err(InputError::NotANumber));
    }

    #[test]
    fn price_step_accepts_zero_but_not_negative() {
        let mut draft = OrderDraft::default();
        assert_eq!(
            advance(ConversationState::AwaitingPrice, &mut draft, "-5"),
            Step::Retry(InputError::Negative)
        );
        assert_eq!(
            advance(ConversationState::AwaitingPrice, &mut draft, "0"),
            Step::Next(ConversationState::AwaitingFrom)
        );
        assert_eq!(draft.price, Some(0.0));
        assert_eq!(
            advance(ConversationState::AwaitingWeight, &mut draft, "0"),
            Step::Retry(InputError::NotPositive)
        );
    }

    #[test]
    fn full_walk_produces_complete_draft() {
        use ConversationState::*;

        let mut draft = OrderDraft::default();
        assert_eq!(
            advance(AwaitingTitle, &mut draft, "Перевезти холодильник"),
            Step::Next(AwaitingWeight)
        );
        assert_eq!(advance(AwaitingWeight, &mut draft, "70"), Step::Next(AwaitingPrice));
        assert_eq!(advance(AwaitingPrice, &mut draft, "5000"), Step::Next(AwaitingFrom));
        assert_eq!(advance(AwaitingFrom, &mut draft, "Москва"), Step::Next(AwaitingTo));
        assert_eq!(advance(AwaitingTo, &mut draft, "Казань"), Step::Next(AwaitingDescription));

        let Step::Done(done) = advance(AwaitingDescription, &mut draft, "-") else {
            panic!("expected a finished draft");
        };
        assert_eq!(done.description, None);

        let input = done.into_input(Uuid::from_u128(1)).unwrap();
        assert_eq!(input.title, "Перевезти холодильник");
        assert_eq!(input.weight_kg, 70.0);
        assert_eq!(input.price, 5000.0);
        assert_eq!(input.to_location.as_deref(), Some("Казань"));
    }

    #[test]
    fn bad_answer_keeps_state_and_draft() {
        let mut draft = OrderDraft::default();
        let step = advance(ConversationState::AwaitingWeight, &mut draft, "тяжёлый");
        assert_eq!(step, Step::Retry(InputError::NotANumber));
        assert_eq!(draft, OrderDraft::default());
    }

    #[test]
    fn incomplete_draft_cannot_become_an_order() {
        let err = OrderDraft::default()
            .into_input(Uuid::nil())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn store_walks_and_forgets_finished_draft() {
        let store = ConversationStore::new(Duration::from_secs(60));
        let k = key(1);
        assert!(store.feed(k, "hello").await.is_none());

        store.start(k).await;
        for answer in ["Диван", "50", "2000", "Тверь", "Москва"] {
            assert!(matches!(store.feed(k, answer).await, Some(Step::Next(_))));
        }
        assert!(matches!(store.feed(k, "осторожно").await, Some(Step::Done(_))));
        assert!(!store.is_active(k).await);
    }

    #[tokio::test]
    async fn conversations_are_isolated_per_user() {
        let store = ConversationStore::new(Duration::from_secs(60));
        store.start(key(1)).await;
        assert!(store.is_active(key(1)).await);
        assert!(!store.is_active(key(2)).await);
        assert!(store.cancel(key(1)).await);
        assert!(!store.cancel(key(1)).await);
    }

    #[tokio::test]
    async fn idle_conversation_expires() {
        let store = ConversationStore::new(Duration::from_secs(10));
        let start = Instant::now();
        store.start_at(key(1), start).await;
        store.start_at(key(2), start).await;

        let later = start + Duration::from_secs(11);
        assert!(store.feed_at(key(1), "Шкаф", later).await.is_none());
        assert_eq!(store.purge_expired_at(later).await, 1);
        assert!(!store.is_active_at(key(2), later).await);
    }
}
