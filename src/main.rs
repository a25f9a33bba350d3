use std::sync::{Arc, Mutex};

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use ridebook::auth::jwt::DEFAULT_SECRET;
use ridebook::config::AppConfig;
use ridebook::db;
use ridebook::router::build_router;
use ridebook::services::notifications::fcm::{FcmPushProvider, LogPushProvider};
use ridebook::services::notifications::PushProvider;
use ridebook::services::otp::LogOtpDelivery;
use ridebook::services::payments::stripe::StripePaymentProvider;
use ridebook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    if config.jwt.secret == DEFAULT_SECRET {
        tracing::warn!("JWT_SECRET is not set, using the insecure default");
    }
    if config.stripe_secret_key.is_empty() {
        tracing::warn!("STRIPE_SECRET_KEY is not set, payment calls will fail");
    }

    let conn = db::init_db(&config.database_url)?;
    let db = Arc::new(Mutex::new(conn));

    let push: Box<dyn PushProvider> = if config.fcm_server_key.is_empty() {
        tracing::info!("FCM_SERVER_KEY not set, push notifications are log only");
        Box::new(LogPushProvider)
    } else {
        Box::new(FcmPushProvider::new(config.fcm_server_key.clone()))
    };

    let state = Arc::new(AppState {
        db: db.clone(),
        config: config.clone(),
        payments: Box::new(StripePaymentProvider::new(
            config.stripe_secret_key.clone(),
            config.stripe_api_base.clone(),
        )),
        push,
        otp_delivery: Box::new(LogOtpDelivery),
    });

    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router and its state are dropped once serve returns.
    match Arc::try_unwrap(db) {
        Ok(mutex) => {
            let conn = mutex
                .into_inner()
                .map_err(|_| anyhow::anyhow!("database lock poisoned"))?;
            conn.close()
                .map_err(|(_, e)| e)
                .context("failed to close database")?;
        }
        Err(_) => tracing::warn!("database still referenced at shutdown, closing on drop"),
    }

    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => tracing::error!("failed to listen for SIGTERM: {e}"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
