use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, settings_summary};

/// Install the fmt subscriber. `RUST_LOG` wins; otherwise `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Load `.env` and the configuration (fatal on error).
pub fn init_foundation() -> Result<AppConfig, anyhow::Error> {
    load_dotenv();
    let config = AppConfig::load()?;

    for setting in settings_summary(|key| std::env::var(key).ok()) {
        tracing::debug!(
            key = setting.key,
            value = %setting.value,
            overridden = setting.overridden,
            "{}",
            setting.description
        );
    }

    tracing::info!(
        url = %config.irc_url,
        channels = config.channels.len(),
        history_capacity = config.history_capacity,
        "Settings loaded"
    );
    Ok(config)
}

/// Load .env from multiple candidate paths.
fn load_dotenv() {
    let candidates = [".env", "../.env", "../../.env"];
    for path in &candidates {
        if dotenvy::from_filename(path).is_ok() {
            tracing::info!("Loaded .env from: {path}");
            return;
        }
    }
    tracing::info!("No .env file found, using system environment variables");
}
