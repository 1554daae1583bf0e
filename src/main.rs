use actix_web::{App, HttpServer, web};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod app;
mod model;
mod retriever;
mod service;

use app::AppState;
use model::Config;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present (ignore if missing)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let bind_addr = config.bind_addr();

    let state = AppState::new(&config).map_err(|e| {
        tracing::error!(error = %e, "Failed to initialize services");
        std::io::Error::other(e.to_string())
    })?;

    // Abort in-flight topic runs as soon as a stop is requested
    let signal_watch = app::cancel_on(state.shutdown.clone(), app::shutdown_signal());

    let abstract_analyzer = web::Data::new(state.abstract_analyzer);
    let topic_analyzer = web::Data::new(state.topic_analyzer);
    let pdf_extractor = web::Data::new(state.pdf_extractor);
    let shutdown = web::Data::new(state.shutdown.clone());

    tracing::info!(
        model = %config.llm.model,
        "Starting Research Gap Finder server on {}",
        bind_addr
    );

    let result = HttpServer::new(move || {
        App::new()
            .app_data(abstract_analyzer.clone())
            .app_data(topic_analyzer.clone())
            .app_data(pdf_extractor.clone())
            .app_data(shutdown.clone())
            .configure(api::configure)
    })
    .bind(&bind_addr)?
    .run()
    .await;

    state.shutdown.cancel();
    let _ = signal_watch.await;
    tracing::info!("Server stopped");

    result
}
