use std::path::Path;
use std::sync::Arc;
use std::fs;

use clap::Parser;
use sqlx::postgres::PgPoolOptions;

use futureplus::services;
use futureplus::settings::Settings;
use futureplus::storage::{MemoryStorage, PostgresStorage, Storage};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    #[arg(long, default_value = "log4rs.yaml")]
    log4rs: String,
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let args = Args::parse();
    let settings = Settings::load(&args.config).expect("Could not load config file.");
    init_logging(&args.log4rs).expect("Could not initialize logging.");

    let storage = build_storage(&settings)
        .await
        .expect("Could not initialize storage.");
    log::info!("Storage backend: {}.", storage.backend_name());

    services::start_services(storage, settings)
        .await
        .expect("Could not start services.");
}

async fn build_storage(settings: &Settings) -> Result<Arc<dyn Storage>, anyhow::Error> {
    match settings.storage.backend.as_str() {
        "postgres" => {
            let postgres = settings.postgres.as_ref().ok_or_else(|| {
                anyhow::anyhow!("storage.backend is postgres but [postgres] is not configured")
            })?;
            let conn = PgPoolOptions::new()
                .max_connections(5)
                .connect(&postgres.url)
                .await?;

            let storage = PostgresStorage::new(conn);
            storage.init_schema().await?;
            storage.seed(&settings.admin.key).await?;
            Ok(Arc::new(storage))
        }
        "memory" => Ok(Arc::new(MemoryStorage::seeded(&settings.admin.key)?)),
        other => Err(anyhow::anyhow!("unknown storage backend: {other}")),
    }
}

fn init_logging(path: &str) -> Result<(), anyhow::Error> {
    if !Path::new("logs").exists() {
        fs::create_dir("logs")?;
    }

    match log4rs::init_file(path, Default::default()) {
        Ok(_) => {
            println!("[*] Logging initialized successfully.");
            Ok(())
        }
        Err(e) => {
            println!("[ERROR] Failed to initialize logging: {}", e);
            Err(anyhow::anyhow!("Could not initialize logging: {}", e))
        }
    }
}
