use std::process::ExitCode;

use annostore::AnnostoreError;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match annostore::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            if let AnnostoreError::ValidationFailed { report, .. } = &err {
                eprint!("{}", report);
            }
            ExitCode::FAILURE
        }
    }
}
