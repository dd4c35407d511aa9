use std::sync::Arc;

use tagall_core::{
    broadcast::BroadcastPlanner,
    commands::CommandRouter,
    config::Config,
    registry::Registry,
    store::{MemberStore, Migration},
};

#[tokio::main]
async fn main() -> Result<(), tagall_core::Error> {
    tagall_core::logging::init("tagall")?;

    let cfg = Arc::new(Config::load()?);

    let store = MemberStore::new(cfg.members_file.clone());
    match store.migrate_on_startup()? {
        Migration::Created => tracing::info!("starting with an empty member list"),
        Migration::Upgraded { from } => tracing::info!(?from, "members file upgraded"),
        Migration::Current => {}
        Migration::Unrecognized => {
            tracing::warn!("members file is unreadable; it will load as empty until fixed")
        }
    }

    let registry = Arc::new(Registry::new(store));
    let commands = Arc::new(CommandRouter::new(
        registry,
        BroadcastPlanner::from_config(&cfg),
    ));

    tagall_telegram::router::run_polling(cfg, commands)
        .await
        .map_err(|e| tagall_core::Error::External(format!("telegram bot failed: {e:#}")))?;

    Ok(())
}
