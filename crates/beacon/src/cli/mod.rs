use clap::{CommandFactory, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

pub mod snapshot;
pub mod visit;

#[derive(Parser)]
#[command(
    name = "beacon",
    version,
    about = "Collect a device snapshot, ask about location, send it on"
)]
struct Cli {
    /// Config file (defaults to ~/.beacon/config.toml when present)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline once: consent, location, snapshot, send, navigate
    Visit(visit::VisitArgs),
    /// Print the telemetry snapshot this host would send
    Snapshot,
}

pub async fn run<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => match cli.command {
            Some(Commands::Visit(args)) => visit::run(cli.config, args).await,
            Some(Commands::Snapshot) => snapshot::run(cli.config).await,
            None => {
                let mut cmd = Cli::command();
                let _ = cmd.print_help();
                println!();
                0
            }
        },
        Err(e) => {
            let code = e.exit_code();
            let _ = e.print();
            code
        }
    }
}

pub async fn run_cli_async<F, Fut>(f: F) -> i32
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<(), String>>,
{
    match f().await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("{err}");
            1
        }
    }
}
