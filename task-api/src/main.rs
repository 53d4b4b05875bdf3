#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();
    let config = task_api::config::Config::from_env()?;
    task_api::web::start_web_server(config).await
}
