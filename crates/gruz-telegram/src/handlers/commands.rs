use gruz_core::{
    domain::{ChatId, UserId},
    messaging::types::{Command, IncomingUpdate, Sender, TextMessage},
};

/// Split `/cmd@botname arg1 ...` into the lowercased command and the rest.
pub fn parse_command(text: &str) -> (String, String) {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// Build a transport-neutral update from a text message.
///
/// Messages without a sender (channel posts) or without text are dropped.
pub fn to_update(chat_id: ChatId, from: Option<Sender>, text: Option<&str>) -> Option<IncomingUpdate> {
    let from = from?;
    let text = text?;

    if text.starts_with('/') {
        let (name, args) = parse_command(text);
        if name.is_empty() {
            return None;
        }
        return Some(IncomingUpdate::Command(Command {
            chat_id,
            from,
            name,
            args,
        }));
    }

    Some(IncomingUpdate::Text(TextMessage {
        chat_id,
        from,
        text: text.to_string(),
    }))
}

pub fn sender(user: &teloxide::types::User) -> Sender {
    Sender {
        user_id: UserId(user.id.0 as i64),
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn someone() -> Sender {
        Sender {
            user_id: UserId(7),
            username: None,
            first_name: "Оля".into(),
            last_name: None,
        }
    }

    #[test]
    fn strips_bot_suffix_and_lowercases() {
        assert_eq!(
            parse_command("/Orders@gruz_bot  page 2 "),
            ("orders".to_string(), "page 2".to_string())
        );
        assert_eq!(parse_command("/start"), ("start".to_string(), String::new()));
    }

    #[test]
    fn slash_text_becomes_command() {
        let update = to_update(ChatId(1), Some(someone()), Some("/create_order")).unwrap();
        let IncomingUpdate::Command(cmd) = update else {
            panic!("expected a command");
        };
        assert_eq!(cmd.name, "create_order");
        assert_eq!(cmd.from.user_id, UserId(7));
    }

    #[test]
    fn plain_text_is_kept_verbatim() {
        let update = to_update(ChatId(1), Some(someone()), Some(" 12,5 кг ")).unwrap();
        assert_eq!(
            update,
            IncomingUpdate::Text(TextMessage {
                chat_id: ChatId(1),
                from: someone(),
                text: " 12,5 кг ".into(),
            })
        );
    }

    #[test]
    fn drops_anonymous_and_non_text_messages() {
        assert_eq!(to_update(ChatId(1), None, Some("/start")), None);
        assert_eq!(to_update(ChatId(1), Some(someone()), None), None);
        assert_eq!(to_update(ChatId(1), Some(someone()), Some("/")), None);
    }
}
