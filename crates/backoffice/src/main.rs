//! Boot check: verifies repository registration and storage connectivity.

use std::process::ExitCode;

use backoffice::{Backend, Config, telemetry};

#[tokio::main]
async fn main() -> ExitCode {
    // 1. Initialize tracing
    let config = Config::from_env();
    telemetry::init(&config);

    // 2. Build the backend; this runs the registration self-check
    let backend = match Backend::from_config(&config).await {
        Ok(backend) => backend,
        Err(error) => {
            tracing::error!(%error, category = ?error.category(), "startup failed");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(backend = backend.name(), "backend ready");

    // 3. Open and roll back one transaction
    if let Err(error) = backend.smoke_test().await {
        tracing::error!(%error, category = ?error.category(), "smoke test failed");
        return ExitCode::FAILURE;
    }

    tracing::info!("boot check passed");
    ExitCode::SUCCESS
}
