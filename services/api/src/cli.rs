use crate::demo::{run_demo, run_performance_score, DemoArgs, ScoreArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tutor_pairing::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Tutor Pairing",
    about = "Run the tutor pairing service or walk through its workflows from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Score tutors offline from exported session history
    Performance {
        #[command(subcommand)]
        command: PerformanceCommand,
    },
    /// Run the pairing and tiering scenarios against an in-memory store
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum PerformanceCommand {
    /// Compute a tutor's performance score and suggested tier from a session CSV
    Score(ScoreArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Load tutors, tutor courses, enrollments and sessions from this directory of CSVs
    #[arg(long)]
    pub(crate) seed_dir: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Performance {
            command: PerformanceCommand::Score(args),
        } => run_performance_score(args),
        Command::Demo(args) => run_demo(args),
    }
}
