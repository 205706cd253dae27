use async_trait::async_trait;

use crate::{domain::ChatId, Result};

/// Outgoing side of a chat transport.
///
/// Bot logic produces HTML replies; the Telegram adapter implements this with
/// HTML parse mode.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<()>;
}
