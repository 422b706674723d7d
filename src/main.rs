use dotenvy::dotenv;
use tracing::info;

use subpay_api::infra::{app::create_app, setup::init_app_state};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let app_state = init_app_state().await?;

    let bind_addr = app_state.config.bind_addr;

    let app = create_app(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Billing API listening at {}", &listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
