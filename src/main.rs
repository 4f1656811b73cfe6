use room_chat::config::Settings;
use room_chat::startup::Application;
use room_chat::telemetry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_tracing();

    let settings = Settings::load()?;
    tracing::info!(
        environment = %settings.environment,
        "Starting room-chat gateway"
    );

    let application = Application::build(settings).await?;
    application.run_until_stopped().await
}
