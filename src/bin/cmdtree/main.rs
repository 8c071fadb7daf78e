use std::process::ExitCode;

use clap::Parser;
use log::{debug, info};
use tokio_util::sync::CancellationToken;

use cmdtree::{Context, ExecError, Executor, ScriptError, load_manifest, logger};

#[derive(Parser, Debug)]
#[command(name = "cmdtree", about = "Run a command tree defined in a manifest")]
struct Cli {
    /// Path to manifest (auto-detected if not specified)
    #[arg(short, long)]
    config: Option<String>,

    /// Log file path (logs are also written to stderr)
    #[arg(long)]
    log_file: Option<String>,

    /// Print the command tree and exit
    #[arg(long)]
    outline: bool,

    /// Arguments for the manifest's command tree
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[tokio::main]
async fn run() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_file = cli.log_file.as_deref().map(std::fs::File::create).transpose()?;
    logger::init(log_file)?;

    let (root, config_path) = load_manifest(cli.config.as_deref())?;
    debug!("Using manifest {}", config_path.display());
    let executor = Executor::new(root)?;

    if cli.outline {
        println!("{}", executor.tree().outline());
        return Ok(ExitCode::SUCCESS);
    }

    let token = CancellationToken::new();
    let ctx = Context::background().with_token(token.clone());
    let args = cli.args;
    let mut task = tokio::task::spawn_blocking(move || {
        let mut executor = executor;
        executor.execute(&ctx, args).map(|_| ()).map_err(exit_code)
    });

    let outcome = tokio::select! {
        res = &mut task => res?,
        Ok(()) = tokio::signal::ctrl_c() => {
            info!("Interrupted, cancelling");
            token.cancel();
            task.await?
        }
    };

    Ok(match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => code,
    })
}

/// Reports an execution failure and picks the process exit code for it.
fn exit_code(err: ExecError) -> ExitCode {
    if let Some(cmd_err) = err.as_command_error() {
        if cmd_err.is_display_request() {
            println!("{}", cmd_err.kind());
            return ExitCode::SUCCESS;
        }
        eprintln!("Error: {err}");
        return ExitCode::from(2);
    }
    eprintln!("Error: {err}");
    match err.into_run_error() {
        Ok(run_err) => run_err
            .downcast_ref::<ScriptError>()
            .and_then(ScriptError::exit_code)
            .and_then(|code| u8::try_from(code).ok())
            .map_or(ExitCode::FAILURE, ExitCode::from),
        Err(_) => ExitCode::FAILURE,
    }
}
