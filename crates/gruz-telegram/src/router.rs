use std::{sync::Arc, time::Duration};

use teloxide::{
    dispatching::{Dispatcher, ShutdownToken},
    dptree,
    prelude::*,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use gruz_core::{
    conversation::ConversationStore, messaging::port::MessagingPort, security::AdminPolicy,
    service::Service,
};

use crate::{
    admin::AdminBot,
    driver::DriverBot,
    handlers::{self, AdminState, DriverState},
    TelegramMessenger,
};

/// Long-poll the driver bot until `cancel` fires.
pub async fn run_driver_bot(
    token: String,
    service: Service,
    conversation_ttl: Duration,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let bot = Bot::new(token);
    announce(&bot, "driver").await;

    let conversations = Arc::new(ConversationStore::new(conversation_ttl));
    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let state = Arc::new(DriverState {
        bot: DriverBot::new(service, conversations.clone()),
        messenger,
        cancel: cancel.clone(),
    });

    let purge = tokio::spawn(purge_expired(
        conversations,
        purge_period(conversation_ttl),
        cancel.clone(),
    ));

    let handler = Update::filter_message().endpoint(handlers::driver_message);
    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build();

    let watcher = stop_on_cancel(dispatcher.shutdown_token(), cancel, "driver-bot");
    dispatcher.dispatch().await;
    watcher.abort();
    purge.abort();

    tracing::info!("driver bot stopped");
    Ok(())
}

/// Long-poll the admin bot until `cancel` fires.
pub async fn run_admin_bot(
    token: String,
    service: Service,
    policy: AdminPolicy,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let bot = Bot::new(token);
    announce(&bot, "admin").await;

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let state = Arc::new(AdminState {
        bot: AdminBot::new(service, policy),
        messenger,
        cancel: cancel.clone(),
    });

    let handler = Update::filter_message().endpoint(handlers::admin_message);
    let mut dispatcher = Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .build();

    let watcher = stop_on_cancel(dispatcher.shutdown_token(), cancel, "admin-bot");
    dispatcher.dispatch().await;
    watcher.abort();

    tracing::info!("admin bot stopped");
    Ok(())
}

async fn announce(bot: &Bot, role: &str) {
    match bot.get_me().await {
        Ok(me) => tracing::info!(role, username = %me.username(), "bot started"),
        Err(e) => tracing::warn!(role, error = %e, "get_me failed; polling anyway"),
    }
}

/// Ask the dispatcher to stop once `cancel` fires.
///
/// `shutdown` fails while the dispatcher is not running yet, so it is retried.
fn stop_on_cancel(
    token: ShutdownToken,
    cancel: CancellationToken,
    listener: &'static str,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        cancel.cancelled().await;
        tracing::info!(listener, "stopping dispatcher");
        loop {
            match token.shutdown() {
                Ok(done) => {
                    done.await;
                    return;
                }
                Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
            }
        }
    })
}

fn purge_period(ttl: Duration) -> Duration {
    (ttl / 2).clamp(Duration::from_secs(1), Duration::from_secs(60))
}

async fn purge_expired(store: Arc<ConversationStore>, period: Duration, cancel: CancellationToken) {
    let mut tick = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tick.tick() => {
                let purged = store.purge_expired().await;
                if purged > 0 {
                    tracing::debug!(purged, "expired conversations dropped");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purge_period_is_bounded() {
        assert_eq!(purge_period(Duration::from_millis(10)), Duration::from_secs(1));
        assert_eq!(purge_period(Duration::from_secs(30)), Duration::from_secs(15));
        assert_eq!(purge_period(Duration::from_secs(3600)), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn purge_loop_exits_on_cancel() {
        let store = Arc::new(ConversationStore::new(Duration::from_secs(60)));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(purge_expired(store, Duration::from_secs(1), cancel.clone()));
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("purge loop should stop")
            .expect("purge loop should not panic");
    }
}
