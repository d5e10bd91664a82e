// Foodgram API server

use tokio::net::TcpListener;

use foodgram::{api::create_router, app_state::AppState, config::Config, infrastructure::logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_tracing();

    let config = Config::from_env()?;
    let addr = config.server_address();

    let app_state = AppState::new(config).await?;
    let app = create_router(app_state);

    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Foodgram API listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
