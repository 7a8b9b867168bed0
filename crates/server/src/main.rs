use migration::MigratorTrait;
use relay_login::AppResources;
use relay_login::api::start_webserver;
use relay_login::config::load_config_or_panic;
use sea_orm::Database;
use std::sync::Arc;
use tokio::time::{Duration, interval};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn initialize_tracing() {
    let default_directives = "relay_login=info,hyper=warn,sea_orm=info";
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_target(true).with_level(true);

    registry.with(layer).init();
}

#[tokio::main]
async fn main() -> color_eyre::eyre::Result<()> {
    color_eyre::install().expect("Failed to install `color_eyre::install`");

    initialize_tracing();

    // Load config
    let config = Arc::new(load_config_or_panic());

    // Set up SeaORM database connection and bring the schema up to date
    let db = Arc::new(
        Database::connect(&config.database_url)
            .await
            .expect("Failed to connect to database"),
    );
    migration::Migrator::up(db.as_ref(), None)
        .await
        .expect("Failed to run migrations");

    let resources = AppResources::new(db, config)?;

    // Sweep expired pending logins in the background
    {
        let flows = resources.flows.clone();
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                let purged = flows.purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "Purged expired pending logins");
                }
            }
        });
    }

    start_webserver(resources).await
}
