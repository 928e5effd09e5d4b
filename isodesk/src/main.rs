use anyhow::{Context, Result};
use clap::Parser;
use isodesk::dispatch::{self, CommandError, EXIT_INTERNAL};
use isodesk::{init_logging, Engine, EngineConfig};
use std::io::Write;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "isodesk")]
#[command(about = "Desktop automation inside an isolated desktop session")]
#[command(
    long_about = "Runs one automation command against the named isolated desktop and reports the result through the exit code and a single stdout line. Capability gates and coordinate mode are read from ISODESK_* environment variables."
)]
struct Cli {
    /// Command name, e.g. createdesktop, launchondesk, clickpid
    command: Option<String>,

    /// Positional arguments of the command
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn run(cli: Cli) -> Result<i32> {
    if cli.command.is_none() {
        error!("{}", CommandError::NoCommand);
        return Ok(CommandError::NoCommand.exit_code());
    }
    let config = EngineConfig::from_env();
    let engine = Engine::new(config).context("failed to initialise the automation platform")?;

    let mut argv = Vec::with_capacity(cli.args.len() + 1);
    argv.extend(cli.command);
    argv.extend(cli.args);
    let outcome = dispatch::run(&engine, &argv);

    if let Some(line) = &outcome.stdout {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{line}").context("failed to write to stdout")?;
        stdout.flush().context("failed to flush stdout")?;
    }
    Ok(outcome.exit_code)
}

fn main() {
    let cli = Cli::parse();
    init_logging();

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            EXIT_INTERNAL
        }
    };
    std::process::exit(code);
}
