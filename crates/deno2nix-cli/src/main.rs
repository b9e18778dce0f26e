mod commands;

use clap::Parser;
use commands::generate::GenerateOptions;
use commands::{EXIT_FAILURE, EXIT_LOCK_ERROR};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "deno2nix",
    version,
    about = "Generate a Nix file with pinned fetchurl sources from a deno.lock"
)]
struct Cli {
    /// Path to the Deno lock file (v5).
    #[arg(default_value = "deno.lock")]
    lock: PathBuf,

    /// Path of the Nix file to generate.
    #[arg(default_value = "deps.nix")]
    output: PathBuf,

    /// TOML file with registry URLs and lookup limits.
    #[arg(long)]
    config: Option<PathBuf>,

    /// npm registry used for npm tarball URLs (overrides config file).
    #[arg(long)]
    registry_url: Option<String>,

    /// npm mirror serving jsr packages (overrides config file).
    #[arg(long)]
    mirror_url: Option<String>,

    /// Maximum number of concurrent mirror lookups.
    #[arg(short = 'j', long)]
    concurrency: Option<usize>,

    /// Per-request timeout for mirror lookups, in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Time budget for all mirror lookups, in seconds.
    #[arg(long)]
    deadline: Option<u64>,

    /// Do not write OUTPUT; exit non-zero if it differs from the generated file.
    #[arg(long, default_value_t = false)]
    check: bool,

    /// Output the summary as structured JSON.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false)]
    trace: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("DENO2NIX_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let options = GenerateOptions {
        lock: cli.lock,
        output: cli.output,
        config: cli.config,
        registry_url: cli.registry_url,
        mirror_url: cli.mirror_url,
        concurrency: cli.concurrency,
        timeout_secs: cli.timeout,
        deadline_secs: cli.deadline,
        check: cli.check,
    };

    match commands::generate::run(&options, cli.json) {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("lock error:") {
                EXIT_LOCK_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
