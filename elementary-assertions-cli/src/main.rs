use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use elementary_assertions_cli::{run, validate, CliError, Overrides, RunRequest, UreqHealthProbe};

#[derive(Parser)]
#[command(
    name = "elementary-assertions",
    version,
    about = "Deterministic elementary assertions from enriched relations"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build elementary assertions from a relations document.
    Run {
        /// Relations document (JSON).
        #[arg(long)]
        input: PathBuf,

        /// Write output here instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,

        /// TOML configuration file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// wikipedia-title-index service base URL.
        #[arg(long, env = "EA_WTI_ENDPOINT")]
        wti_endpoint: Option<String>,

        /// Health-check timeout in milliseconds.
        #[arg(long)]
        wti_timeout_ms: Option<u64>,

        /// Also run the diagnostic-coherence checks.
        #[arg(long)]
        strict: bool,

        /// Single-line JSON output.
        #[arg(long)]
        compact: bool,
    },
    /// Validate an elementary assertions document.
    Validate {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        strict: bool,
    },
}

fn report(err: &CliError) -> ExitCode {
    match err.code() {
        Some(code) => eprintln!("error [{code}]: {err}"),
        None => eprintln!("error: {err}"),
    }
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            input,
            out,
            config,
            wti_endpoint,
            wti_timeout_ms,
            strict,
            compact,
        } => {
            let request = RunRequest {
                input,
                out,
                config,
                overrides: Overrides {
                    wti_endpoint,
                    wti_timeout_ms,
                    strict,
                },
                compact,
            };
            match run(&request, &UreqHealthProbe, &mut std::io::stdout().lock()) {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => report(&err),
            }
        }
        Command::Validate { input, strict } => match validate(&input, strict) {
            Ok(()) => {
                println!("ok");
                ExitCode::SUCCESS
            }
            Err(err) => {
                if let Some(code) = err.code() {
                    println!("{code}");
                }
                report(&err)
            }
        },
    }
}
