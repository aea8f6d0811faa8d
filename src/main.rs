use std::{error::Error, path::PathBuf};

use clap::Parser;
use odata_jsonsql::{
    schema::SchemaGraph,
    server::{self, AppState, Config},
};
use tracing::info;

#[derive(Parser)]
struct ServerOptions {
    #[arg(long, env, default_value_t = 8080)]
    port: u16,
    /// Sqlite database file
    #[arg(long, env)]
    database: PathBuf,
    /// Schema graph json file
    #[arg(long, env)]
    schema: PathBuf,
    /// Document property matched by `/:entity/:id`
    #[arg(long, env, default_value = "id")]
    key_property: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let _otel = init_tracing_opentelemetry::tracing_subscriber_ext::init_subscribers()?;

    let options = ServerOptions::parse();

    let graph = SchemaGraph::from_file(&options.schema)?;
    let connection = rusqlite::Connection::open(&options.database)?;
    info!(
        schemas = graph.schema_names().count(),
        database = %options.database.display(),
        "loaded schema graph"
    );

    let state = AppState::new(
        Config {
            key_property: options.key_property,
        },
        graph,
        connection,
    );
    let router = server::router(state);

    let address = format!("0.0.0.0:{}", options.port).parse()?;

    info!("Starting server on {}", address);

    axum::Server::bind(&address)
        .serve(router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
