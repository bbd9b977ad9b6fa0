use dormgate::api;
use dormgate::logger::*;
use dormgate::server::*;
use dormgate::settings::*;
use std::fs;
use std::sync::Arc;
use tokio::signal;
use warp::Filter;

fn ensure_file(path: &str, what: &str) -> anyhow::Result<()> {
    if !fs::metadata(path)?.is_file() {
        return Err(anyhow::anyhow!("{what} is not a regular file: {path:?}"));
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "could not listen for SIGINT");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let logger = Logger::new_bootstrap();

    let project_settings = parse_settings(cli.settings.as_deref())?;
    info!(?project_settings);
    let logger_config = LogConfig {
        filter: project_settings.log.filter.clone(),
    };
    logger.reload_from_config(&logger_config)?;

    let address: std::net::SocketAddr = project_settings.http.address.parse()?;

    let server = Arc::new(Server::try_new(&project_settings).await?);

    let api_v1 = warp::path("api")
        .and(warp::path("v1"))
        .and(api::v1::routes(server.clone()))
        .recover(api::v1::recover_error)
        .with(warp::trace::request());

    match (&project_settings.http.cert_path, &project_settings.http.key_path) {
        (Some(cert_path), Some(key_path)) => {
            ensure_file(cert_path, "TLS cert")?;
            ensure_file(key_path, "TLS key")?;
            info!(%address, "serving https");
            warp::serve(api_v1)
                .tls()
                .cert_path(cert_path)
                .key_path(key_path)
                .bind_with_graceful_shutdown(address, shutdown_signal())
                .1
                .await;
        }
        _ => {
            info!(%address, "serving http");
            let (_, serving) = warp::serve(api_v1)
                .try_bind_with_graceful_shutdown(address, shutdown_signal())?;
            serving.await;
        }
    }

    let shutdown_timeout = std::time::Duration::from_secs(30);
    match tokio::time::timeout(shutdown_timeout, server.shutdown()).await {
        Ok(_) => info!("server shutdown successfully"),
        Err(_) => error!("server shutdown timed out"),
    }

    Ok(())
}
