use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use ws_service::config::ServiceConfig;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    // hyper-rustls needs a process-wide default crypto provider installed
    // before the first TLS connection (signing-cert fetches, Shock HTTPS
    // calls); which backend is compiled in is selected by the `ring` /
    // `aws_lc_rs` feature.
    if rustls::crypto::CryptoProvider::get_default().is_none() {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    }

    let config = match ServiceConfig::from_env() {
        Ok(config) => Arc::new(config),
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = ws_service::run(config).await {
        eprintln!("workspace service exited: {err}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
