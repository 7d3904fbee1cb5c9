use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*};
use tracing::{error, info};

use ttb_core::{
    config::Config, messaging::port::MessagingPort, store::CredentialStore,
    tracker::TimeTrackerPort, watcher::TimerWatcher,
};

use crate::{handlers, TelegramMessenger};

/// Everything a handler needs, passed as a dptree dependency. No
/// ambient globals.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub store: Arc<CredentialStore>,
    pub tracker: Arc<dyn TimeTrackerPort>,
    pub watcher: TimerWatcher,
    pub messenger: Arc<dyn MessagingPort>,
}

pub async fn run_polling(
    cfg: Arc<Config>,
    store: Arc<CredentialStore>,
    tracker: Arc<dyn TimeTrackerPort>,
) -> anyhow::Result<()> {
    let bot = Bot::new(cfg.bot_token.clone());

    if let Ok(me) = bot.get_me().await {
        info!("ttb started: @{}", me.username());
    }
    info!("check interval: {}s", cfg.check_interval.as_secs());
    info!("session store: {}", cfg.database_path.display());

    let messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let watcher = TimerWatcher::new(
        cfg.clone(),
        store.clone(),
        tracker.clone(),
        messenger.clone(),
    );

    // Resume sessions the previous process left mid-poll.
    match watcher.recover().await {
        Ok(0) => {}
        Ok(n) => info!("recovered {n} polling sessions"),
        Err(e) => error!("recovery failed: {e}"),
    }

    let state = Arc::new(AppState {
        cfg,
        store,
        tracker,
        watcher: watcher.clone(),
        messenger,
    });

    let handler = dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handlers::handle_callback))
        .branch(Update::filter_edited_message().endpoint(handlers::handle_edited_message))
        .branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    // Pending checks die here; the persisted polling flags stay true so
    // the next startup resumes them.
    watcher.shutdown().await;

    Ok(())
}
