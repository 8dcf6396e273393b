use anyhow::Context;
use connect_app::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app = App::load().context("failed to bootstrap connect-app")?;

    tracing::info!(
        env = ?app.settings().environment,
        database = %app.settings().database.name,
        "connect-app starting"
    );

    app.serve(connect_http::shutdown_signal()).await
}
