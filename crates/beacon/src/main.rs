//! beacon - run the consent-aware telemetry pipeline from a terminal.

mod cli;
mod terminal;

#[tokio::main]
async fn main() {
    beacon_core::init_tracing();
    let code = cli::run(std::env::args_os()).await;
    std::process::exit(code);
}
