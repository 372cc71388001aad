use atty::Stream;
use color_eyre::Result;
use pyimport_core::ExecutionOutcome;
use serde_json::Value;

use crate::style::Style;

#[derive(Clone, Copy, Debug)]
pub struct OutputOptions {
    pub quiet: bool,
    pub json: bool,
    pub no_color: bool,
}

/// Print `outcome` and return the process exit code.
pub fn emit_output(opts: &OutputOptions, outcome: &ExecutionOutcome) -> Result<i32> {
    let code = outcome.status.exit_code();

    if opts.json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(code);
    }

    let style = Style::new(opts.no_color, atty::is(Stream::Stdout));
    if !opts.quiet {
        for notice in outcome.notices() {
            println!("{}", style.notice(notice));
        }
        println!("{}", style.status(outcome.status, &outcome.message));
        if let Some(hint) = hint_from_details(&outcome.details) {
            println!("{}", style.info(&format!("Tip: {hint}")));
        }
    } else if code != 0 {
        eprintln!("{}", outcome.message);
    }

    Ok(code)
}

fn hint_from_details(details: &Value) -> Option<&str> {
    details
        .as_object()
        .and_then(|map| map.get("hint"))
        .and_then(Value::as_str)
}
