use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use traceam_api::auth::jwt::JwtKeys;
use traceam_api::config::ServerConfig;
use traceam_api::router::build_app_router;
use traceam_api::state::AppState;
use traceam_events::{
    EmailChannel, EmailConfig, EventBus, EventPersistence, NotificationDispatcher, OfflineChannel,
    SmsChannel, SmsConfig, SmtpEmail, TermiiSms,
};
use traceam_sos::{EngineConfig, IncidentEngine};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    init_tracing();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Database ---
    let pool = traceam_db::create_pool(&config.database_url, config.database_max_connections)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    traceam_db::health_check(&pool)
        .await
        .expect("Database health check failed");

    traceam_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());
    let persistence_handle = tokio::spawn(EventPersistence::run(
        pool.clone(),
        event_bus.subscribe(),
    ));

    // --- Delivery channels ---
    let sms: Arc<dyn SmsChannel> = match SmsConfig::from_env() {
        Some(sms_config) => {
            Arc::new(TermiiSms::new(sms_config).expect("Failed to build SMS client"))
        }
        None => {
            tracing::warn!("TERMII_API_KEY not set, SMS alerts will be skipped");
            Arc::new(OfflineChannel::sms())
        }
    };
    let email: Arc<dyn EmailChannel> = match EmailConfig::from_env() {
        Some(email_config) => {
            Arc::new(SmtpEmail::new(email_config).expect("Failed to build SMTP transport"))
        }
        None => {
            tracing::warn!("SMTP_HOST not set, email alerts will be skipped");
            Arc::new(OfflineChannel::email())
        }
    };
    let dispatcher = Arc::new(NotificationDispatcher::new(sms, email));

    // --- Incident engine ---
    let engine = IncidentEngine::new(
        Arc::new(traceam_db::PgIncidentStore::new(pool.clone())),
        Arc::new(traceam_db::PgUserStore::new(pool)),
        dispatcher,
        Arc::clone(&event_bus),
        EngineConfig::from_env(),
    );

    let state = AppState {
        engine: Arc::new(engine),
        jwt: Arc::new(JwtKeys::new(&config.jwt)),
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, draining events");

    // The router (and the engine's bus handle) is gone once serve returns;
    // dropping the last sender closes the channel so persistence exits.
    drop(event_bus);
    let drain = Duration::from_secs(config.shutdown_timeout_secs);
    if tokio::time::timeout(drain, persistence_handle).await.is_err() {
        tracing::warn!("Event persistence did not drain before the shutdown timeout");
    }

    tracing::info!("Graceful shutdown complete");
}

/// `RUST_LOG` filter, defaulting to debug for the service crates.
/// `LOG_FORMAT=json` switches to one JSON object per line.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "traceam_api=debug,traceam_sos=debug,traceam_events=debug,tower_http=debug".into()
    });

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("Received SIGINT, starting graceful shutdown"),
        () = terminate => tracing::info!("Received SIGTERM, starting graceful shutdown"),
    }
}
