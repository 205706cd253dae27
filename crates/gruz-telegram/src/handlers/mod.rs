//! Teloxide endpoints.
//!
//! Each endpoint turns a `Message` into an [`IncomingUpdate`], asks the bot for
//! a reply and sends it as HTML. Bot logic never sees teloxide types.

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};
use tokio_util::sync::CancellationToken;

use gruz_core::{
    domain::ChatId,
    messaging::{port::MessagingPort, types::IncomingUpdate},
};

use crate::{admin::AdminBot, driver::DriverBot};

pub mod commands;

pub struct DriverState {
    pub bot: DriverBot,
    pub messenger: Arc<dyn MessagingPort>,
    pub cancel: CancellationToken,
}

pub struct AdminState {
    pub bot: AdminBot,
    pub messenger: Arc<dyn MessagingPort>,
    pub cancel: CancellationToken,
}

fn incoming(msg: &Message) -> Option<IncomingUpdate> {
    commands::to_update(
        ChatId(msg.chat.id.0),
        msg.from().map(commands::sender),
        msg.text(),
    )
}

async fn reply(messenger: &dyn MessagingPort, chat_id: ChatId, text: Option<String>) {
    let Some(text) = text else {
        return;
    };
    if let Err(e) = messenger.send_html(chat_id, &text).await {
        tracing::warn!(chat = chat_id.0, error = %e, "failed to send reply");
    }
}

pub async fn driver_message(msg: Message, state: Arc<DriverState>) -> ResponseResult<()> {
    let Some(update) = incoming(&msg) else {
        return Ok(());
    };
    let text = state.bot.handle(&update, &state.cancel).await;
    reply(state.messenger.as_ref(), update.chat_id(), text).await;
    Ok(())
}

pub async fn admin_message(msg: Message, state: Arc<AdminState>) -> ResponseResult<()> {
    let Some(update) = incoming(&msg) else {
        return Ok(());
    };
    let text = state.bot.handle(&update, &state.cancel).await;
    reply(state.messenger.as_ref(), update.chat_id(), text).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use gruz_core::testing::RecordingMessenger;

    #[tokio::test]
    async fn reply_sends_only_when_there_is_text() {
        let messenger = RecordingMessenger::new();
        reply(&messenger, ChatId(3), None).await;
        reply(&messenger, ChatId(3), Some("<b>ok</b>".into())).await;
        assert_eq!(messenger.sent(), vec![(ChatId(3), "<b>ok</b>".to_string())]);
    }
}
