use filepipe_api::setup;
use filepipe_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;

    let app = setup::initialize_app(config.clone()).await?;

    setup::server::start_server(&config, app.router, app.workers).await?;

    Ok(())
}
