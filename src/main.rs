use anyhow::Context;
use dotenv::dotenv;
use std::sync::Arc;
use subgate::admin::{normalize_stored_channels, AdminAllowlist};
use subgate::config::AppConfig;
use subgate::guard::{Guard, GuardOptions};
use subgate::observability::{init_tracing, log_metrics_summary};
use subgate::platform::telegram::TelegramPlatform;
use subgate::platform::ChatPlatform;
use subgate::store::ConfigStore;
use subgate::subscription::SubscriptionChecker;
use teloxide::Bot;

mod bots;

use bots::admin_menu::AdminMenu;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration error:\n{}", e);
            return Err(e.into());
        }
    };

    let store = Arc::new(
        ConfigStore::open(&config.config_store_path).with_context(|| {
            format!(
                "cannot open config store at {}",
                config.config_store_path.display()
            )
        })?,
    );

    if let Some(chat_id) = config.chat_id {
        match store.seed_chat_id(chat_id).await {
            Ok(true) => tracing::info!("Target chat seeded from CHAT_ID: {}", chat_id),
            Ok(false) => {}
            Err(e) => tracing::warn!("Could not seed target chat: {}", e),
        }
    }

    let bot = Bot::new(&config.bot_token);
    let platform: Arc<dyn ChatPlatform> = Arc::new(TelegramPlatform::new(bot.clone()));

    let normalized = normalize_stored_channels(platform.as_ref(), &store).await;
    if normalized > 0 {
        tracing::info!("Normalized {} stored channel(s) to usernames", normalized);
    }

    let checker = Arc::new(SubscriptionChecker::new(
        Arc::clone(&platform),
        Arc::clone(&store),
        config.required_channels.clone(),
        config.sub_check_cache_ttl,
    ));

    let guard = Arc::new(Guard::new(
        Arc::clone(&platform),
        Arc::clone(&store),
        checker,
        GuardOptions::from_config(&config),
    ));

    let menu = Arc::new(AdminMenu {
        platform,
        store,
        allowlist: AdminAllowlist::new(config.admin_user_ids.iter().copied()),
        language: config.language.clone(),
    });

    tracing::info!(
        "Config store {}, {} fallback channel(s), {} admin(s), language {}",
        config.config_store_path.display(),
        config.required_channels.len(),
        config.admin_user_ids.len(),
        config.language
    );

    bots::guard_bot::run_bot(bot, guard, menu).await;

    log_metrics_summary();
    Ok(())
}
