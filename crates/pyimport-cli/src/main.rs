use clap::Parser;
use color_eyre::Result;
use pyimport_core::{
    import_project, CommandContext, ExecutionOutcome, GlobalOptions, ImportRequest, SystemEffects,
};

mod cli;
mod output;
mod style;

use cli::{CommandGroupCli, ImportArgs, PyimportCli};
use output::{emit_output, OutputOptions};

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = PyimportCli::parse();
    init_tracing(cli.trace, cli.verbose, cli.quiet);

    let global = GlobalOptions {
        quiet: cli.quiet,
        verbose: cli.verbose,
        trace: cli.trace,
        json: cli.json,
        no_color: cli.no_color,
        directory: cli.directory.clone(),
    };

    let outcome = core_call(|| {
        let ctx = CommandContext::new(&global, SystemEffects::shared());
        match &cli.command {
            CommandGroupCli::Import(args) => import_project(&ctx, &import_request(args)),
        }
    });
    let opts = OutputOptions {
        quiet: cli.quiet,
        json: cli.json,
        no_color: cli.no_color,
    };
    let code = emit_output(&opts, &outcome)?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn init_tracing(trace: bool, verbose: u8, quiet: bool) {
    let level = if trace {
        "trace"
    } else if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = format!("pyimport={level},pyimport_core={level},pyimport_domain={level}");
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn import_request(args: &ImportArgs) -> ImportRequest {
    ImportRequest {
        filename: args.filename.clone(),
        format: args.format.map(Into::into),
        dev: args.dev,
        group: args.group.clone(),
        keep_backend: args.keep_backend,
    }
}

/// Turn unexpected errors into a failure outcome so every run ends with a
/// status line or JSON envelope.
fn core_call<F>(action: F) -> ExecutionOutcome
where
    F: FnOnce() -> anyhow::Result<ExecutionOutcome>,
{
    match action() {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::debug!(error = ?err, "command failed");
            let issues: Vec<String> = err.chain().map(std::string::ToString::to_string).collect();
            ExecutionOutcome::failure(
                err.to_string(),
                serde_json::json!({
                    "reason": "internal_error",
                    "error": err.to_string(),
                    "issues": issues,
                    "hint": "Re-run with `-v` for more detail.",
                }),
            )
        }
    }
}
