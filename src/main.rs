use anyhow::Context;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parkswap::config::Config;
use parkswap::navigation::{Route, RouteWatcher};
use parkswap::state::AppState;

fn report(route: Route, state: &AppState) {
    let screens: Vec<String> = route.screens().iter().map(|s| format!("{:?}", s)).collect();
    match route {
        Route::Authenticated => {
            let user = state.store.current().user.map(|u| u.id.to_string());
            tracing::info!(
                "🧭 Route: {} (user: {}) screens: [{}]",
                route,
                user.unwrap_or_default(),
                screens.join(", ")
            );
        }
        _ => tracing::info!("🧭 Route: {} screens: [{}]", route, screens.join(", ")),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    tracing::info!("✅ Configuration loaded successfully");

    let state = AppState::new(&config).context("Failed to initialize application state")?;
    tracing::info!("✅ AppState initialized");

    let mut routes = RouteWatcher::new(&state.store);
    report(routes.current(), &state);

    let guard = state.store.initialize(&state.auth).await;

    let cancel = CancellationToken::new();
    let refresher = state
        .auth
        .spawn_auto_refresh(config.auto_refresh_tick, cancel.clone());
    tracing::info!(
        "✅ Session auto-refresh started (every {}s)",
        config.auto_refresh_tick.as_secs()
    );
    tracing::info!("✅ All systems operational");

    loop {
        tokio::select! {
            changed = routes.changed() => match changed {
                Some(route) => report(route, &state),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("🛑 Shutdown requested");
                break;
            }
        }
    }

    cancel.cancel();
    if let Err(e) = refresher.await {
        tracing::error!("❌ Auto-refresh task ended abnormally: {}", e);
    }
    guard.teardown();

    Ok(())
}
