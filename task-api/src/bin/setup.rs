use clap::Parser;
use sea_orm::Database;

/// Prepares the task database: migrations first, then fresh sample data.
#[derive(Parser, Debug)]
struct Cli {
    /// Leave existing rows alone and only report the counts
    #[arg(long)]
    no_populate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    tracing_subscriber::fmt().init();

    let config = task_api::config::Config::from_env()?;
    let db = Database::connect(&config.database_url).await?;
    tracing::info!("Connected to database");

    task_api::setup::setup_database(&db, !args.no_populate).await?;
    tracing::info!("Database setup completed");
    Ok(())
}
