use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use wallet_ledger::{
    config::{database, settings, users},
    core::{Ledger, UserLocks, user},
    errors::Result,
};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal since env vars can be set externally
    dotenv().ok();
    info!("Attempted to load .env file.");

    // 3. Load the ledger configuration
    let config = settings::load_default_config()
        .inspect_err(|e| error!("Critical error loading ledger configuration: {}", e))?;
    info!("Successfully processed ledger configuration.");

    // 4. Connect and make sure the schema exists
    let database_url = database::get_database_url(config.database_url.as_deref());
    let db = database::create_connection(&database_url)
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to initialize database: {}", e))?;

    // 5. Seed configured users
    users::seed_users(&db, &config.users)
        .await
        .inspect_err(|e| error!("Failed to seed users: {}", e))?;

    // 6. Report the state of the ledger
    let ledger = Ledger::new(db, UserLocks::new())
        .with_page_sizes(config.default_page_size, config.max_page_size);
    for account in user::get_all_active_users(ledger.connection()).await? {
        let recent = ledger.first_page(account.id).await?;
        info!(
            user_id = account.id,
            username = %account.username,
            balance = %account.balance_decimal(),
            entries = recent.len(),
            "Wallet"
        );
    }

    Ok(())
}
