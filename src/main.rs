use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use dotenv::dotenv;
use tracing::info;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use dermalens::config::Config;
use dermalens::handlers;
use dermalens::state::AppState;

type Error = Box<dyn std::error::Error + Send + Sync>;

#[actix_web::main]
async fn main() -> Result<(), Error> {
    // Debug level for our crate, warnings for everything else
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("dermalens=debug,warn")),
        )
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_target(true)
        .with_ansi(true)
        .pretty()
        .init();

    dotenv().ok();

    let config = Config::from_env()?;
    let client = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;

    let bind_address = config.bind_address();
    let max_file_size = config.max_file_size;
    let allowed_origins = config.allowed_origins.clone();

    let state = web::Data::new(AppState::from_config(config, client)?);

    info!("Dermalens API listening on {}", bind_address);

    HttpServer::new(move || {
        let cors = allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
            .allow_any_method()
            .allow_any_header()
            .supports_credentials();

        App::new()
            .wrap(cors)
            .wrap(TracingLogger::default())
            .app_data(state.clone())
            .configure(handlers::configure(max_file_size))
    })
    .bind(bind_address)?
    .run()
    .await
    .map_err(Into::into)
}
