//! Telegram adapter (teloxide).
//!
//! Implements the core `MessagingPort` over the Bot API and hosts the driver and
//! admin bots. Bot logic lives in [`driver`] and [`admin`] and works on
//! transport-neutral updates; [`handlers`] and [`router`] are the teloxide glue.

use async_trait::async_trait;
use teloxide::{prelude::*, types::ParseMode};
use tokio::time::sleep;

pub mod admin;
pub mod driver;
pub mod handlers;
pub mod router;

use gruz_core::{domain::ChatId, errors::Error, messaging::port::MessagingPort, Result};

/// Telegram rejects messages above 4096 characters; keep some headroom.
const SAFE_MESSAGE_LIMIT: usize = 4000;

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<()> {
        for chunk in split_message(html, SAFE_MESSAGE_LIMIT) {
            self.with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), chunk.clone())
                    .parse_mode(ParseMode::Html)
            })
            .await?;
        }
        Ok(())
    }
}

/// Split on paragraph boundaries so each chunk stays under `limit` characters.
///
/// Replies are built from self-contained paragraphs, so tags never span a cut
/// unless a single paragraph is itself over the limit.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut out = Vec::new();
    let mut chunk = String::new();
    let mut chunk_len = 0usize;
    for para in text.split("\n\n") {
        let para_len = para.chars().count();
        let sep = if chunk.is_empty() { 0 } else { 2 };

        if chunk_len + sep + para_len <= limit {
            if sep > 0 {
                chunk.push_str("\n\n");
            }
            chunk.push_str(para);
            chunk_len += sep + para_len;
            continue;
        }

        if !chunk.is_empty() {
            out.push(std::mem::take(&mut chunk));
            chunk_len = 0;
        }
        if para_len <= limit {
            chunk.push_str(para);
            chunk_len = para_len;
            continue;
        }

        let chars: Vec<char> = para.chars().collect();
        for piece in chars.chunks(limit) {
            out.push(piece.iter().collect());
        }
    }
    if !chunk.is_empty() {
        out.push(chunk);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_message_is_one_chunk() {
        assert_eq!(split_message("привет", 10), vec!["привет".to_string()]);
    }

    #[test]
    fn splits_between_paragraphs() {
        let text = ["a".repeat(30), "b".repeat(30), "c".repeat(30)].join("\n\n");
        let chunks = split_message(&text, 70);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], format!("{}\n\n{}", "a".repeat(30), "b".repeat(30)));
        assert_eq!(chunks[1], "c".repeat(30));
    }

    #[test]
    fn oversized_paragraph_is_hard_split_by_chars() {
        let text = "ж".repeat(25);
        let chunks = split_message(&text, 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat(), text);
    }
}
