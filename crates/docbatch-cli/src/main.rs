use clap::Parser;
use docbatch_core::logging;

mod cli;

use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // File logging under the XDG state dir; stderr if that is not writable.
    if let Err(file_err) = logging::init_logging(cli.debug) {
        if let Err(e) = logging::init_logging_stderr(cli.debug) {
            eprintln!("docbatch: logging disabled ({:#}; {:#})", file_err, e);
        }
    }

    if let Err(err) = cli.run().await {
        eprintln!("docbatch error: {:#}", err);
        std::process::exit(1);
    }
}
