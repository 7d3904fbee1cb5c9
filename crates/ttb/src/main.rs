use std::sync::Arc;

use ttb_core::{config::Config, store::CredentialStore, tracker::TimeTrackerPort};
use ttb_toggl::TogglClient;

#[tokio::main]
async fn main() -> Result<(), ttb_core::Error> {
    let cfg = Arc::new(Config::load()?);
    ttb_core::logging::init(cfg.debug);

    let store = Arc::new(CredentialStore::open(cfg.database_path.clone())?);
    let tracker: Arc<dyn TimeTrackerPort> = Arc::new(TogglClient::new());

    ttb_telegram::router::run_polling(cfg, store, tracker)
        .await
        .map_err(|e| ttb_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
