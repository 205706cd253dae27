use crate::{
    domain::{ChatId, ConversationKey, UserId},
    service::TelegramProfile,
};

/// Who sent an update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Sender {
    pub user_id: UserId,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
}

impl Sender {
    pub fn profile(&self) -> TelegramProfile {
        TelegramProfile {
            id: self.user_id.0,
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            username: self.username.clone(),
        }
    }
}

/// Transport-neutral incoming update.
///
/// Telegram-specific fields should live in the Telegram adapter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum IncomingUpdate {
    Command(Command),
    Text(TextMessage),
}

impl IncomingUpdate {
    pub fn chat_id(&self) -> ChatId {
        match self {
            IncomingUpdate::Command(c) => c.chat_id,
            IncomingUpdate::Text(t) => t.chat_id,
        }
    }

    pub fn from(&self) -> &Sender {
        match self {
            IncomingUpdate::Command(c) => &c.from,
            IncomingUpdate::Text(t) => &t.from,
        }
    }

    pub fn conversation_key(&self) -> ConversationKey {
        ConversationKey::new(self.chat_id(), self.from().user_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Command {
    pub chat_id: ChatId,
    pub from: Sender,
    /// Lowercased, without the leading `/` or `@botname`.
    pub name: String,
    pub args: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextMessage {
    pub chat_id: ChatId,
    pub from: Sender,
    pub text: String,
}
