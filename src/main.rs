use {
    axum::{
        Router,
        extract::DefaultBodyLimit,
        routing::{get, post},
    },
    pay_flight::adapters::stripe_client::StripeCheckout,
    sqlx::postgres::PgPoolOptions,
    std::{env, sync::Arc, time::Duration},
    tokio::signal,
    tower_http::timeout::TimeoutLayer,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    dotenvy::dotenv().ok();
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let stripe_secret_key =
        env::var("STRIPE_SECRET_KEY").expect("STRIPE_SECRET_KEY must be set");
    let stripe_webhook_secret =
        env::var("STRIPE_WEBHOOK_SECRET").expect("STRIPE_WEBHOOK_SECRET must be set");
    let success_url = env::var("CHECKOUT_SUCCESS_URL").expect("CHECKOUT_SUCCESS_URL must be set");
    let cancel_url = env::var("CHECKOUT_CANCEL_URL").expect("CHECKOUT_CANCEL_URL must be set");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&database_url)
        .await
        .expect("failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    let state = pay_flight::AppState {
        pool,
        stripe_webhook_secret: stripe_webhook_secret.into(),
        provider: Arc::new(StripeCheckout::new(
            stripe_secret_key,
            success_url,
            cancel_url,
        )),
    };

    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .route(
            "/checkout",
            post(pay_flight::adapters::checkout::start_checkout_handler),
        )
        .route(
            "/webhook",
            post(pay_flight::adapters::stripe_webhook::stripe_webhook_handler),
        )
        .layer(DefaultBodyLimit::max(64 * 1024)) // 64 KB — Stripe events are typically <20 KB
        // Request deadline bounds the loser's result-wait loop too.
        .layer(TimeoutLayer::new(Duration::from_secs(15)))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
    tracing::info!("listening on 0.0.0.0:3000");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
