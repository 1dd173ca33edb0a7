use anyhow::{Context, Result};
use argh::FromArgs;
use safe_shell::{Interpreter, InterpreterConfig};
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// Run a safe shell script. Reads the script from stdin when no path is given.
struct Args {
    #[argh(switch)]
    /// validate every command but only report what it would do
    simulate: bool,

    #[argh(switch, short = 'v')]
    /// enable debug logging
    verbose: bool,

    #[argh(switch)]
    /// start an interactive session instead of running a script
    repl: bool,

    #[argh(switch)]
    /// print the available commands and exit
    list_commands: bool,

    #[argh(positional)]
    /// path of the script to run
    script: Option<PathBuf>,
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("SAFE_SHELL_LOG").unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_script(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("can't read script {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("can't read script from stdin")?;
            Ok(buf)
        }
    }
}

fn main() -> Result<ExitCode> {
    let args: Args = argh::from_env();
    init_logging(args.verbose);

    let config = InterpreterConfig::from_env();
    let config = config.with_simulate(config.simulate || args.simulate);
    let sh = Interpreter::new(config);

    if args.list_commands {
        for name in sh.registry().names() {
            println!("{}", name);
        }
        return Ok(ExitCode::SUCCESS);
    }

    if args.repl {
        sh.repl().context("interactive session failed")?;
        return Ok(ExitCode::SUCCESS);
    }

    let script = read_script(args.script.as_ref())?;
    let outcome = sh.execute(&script);
    match outcome.error_message {
        None => {
            info!(simulate = config.simulate, "script finished");
            Ok(ExitCode::SUCCESS)
        }
        Some(message) => {
            eprintln!("{}", message);
            Ok(ExitCode::FAILURE)
        }
    }
}
