use mhttp_core::{config, logging};

mod cli;

use crate::cli::CliCommand;

#[tokio::main]
async fn main() {
    let cfg = match config::load_or_init() {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("mhttp error: {:#}", err);
            std::process::exit(1);
        }
    };

    // Fall back to stderr so an unwritable state dir never blocks a fetch.
    if let Err(err) = logging::init_logging(cfg.log_filter.as_deref()) {
        logging::init_logging_stderr(cfg.log_filter.as_deref());
        tracing::warn!("file logging unavailable: {err:#}");
    }

    if let Err(err) = CliCommand::run_from_args(cfg).await {
        eprintln!("mhttp error: {:#}", err);
        std::process::exit(1);
    }
}
