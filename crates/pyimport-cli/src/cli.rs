use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use pyimport_core::FormatKey;
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(
    name = "pyimport",
    author,
    version,
    about = "Import dependency metadata from other packaging tools into pyproject.toml",
    disable_help_subcommand = true
)]
#[allow(clippy::struct_excessive_bools)]
pub struct PyimportCli {
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)",
        global = true
    )]
    pub quiet: bool,
    #[arg(
        short,
        long,
        action = ArgAction::Count,
        help = "Increase logging (-vv reaches trace)",
        global = true
    )]
    pub verbose: u8,
    #[arg(long, help = "Force trace logging regardless of -v/-q", global = true)]
    pub trace: bool,
    #[arg(
        long,
        help = "Emit {status,message,details} JSON envelopes",
        global = true
    )]
    pub json: bool,
    #[arg(long, help = "Disable colored human output", global = true)]
    pub no_color: bool,
    #[arg(
        short = 'C',
        long,
        value_name = "PATH",
        help = "Project root containing pyproject.toml (defaults to the current directory)",
        global = true
    )]
    pub directory: Option<PathBuf>,
    #[command(subcommand)]
    pub command: CommandGroupCli,
}

#[derive(Subcommand, Debug)]
pub enum CommandGroupCli {
    #[command(about = "Import project metadata from another tool's dependency file")]
    Import(ImportArgs),
}

#[derive(Args, Debug)]
pub struct ImportArgs {
    #[arg(short, long, help = "Import packages into dev dependencies")]
    pub dev: bool,
    #[arg(short = 'G', long, value_name = "NAME", help = "Dependency group to import into")]
    pub group: Option<String>,
    #[arg(
        short,
        long,
        value_enum,
        help = "Source file format; detected from the file when omitted"
    )]
    pub format: Option<FormatArg>,
    #[arg(
        long,
        help = "Keep the existing [build-system] instead of resetting it to the default backend"
    )]
    pub keep_backend: bool,
    #[arg(value_name = "FILENAME", help = "File to import")]
    pub filename: PathBuf,
}

#[derive(ValueEnum, Debug, Clone, Copy, Serialize, Deserialize)]
pub enum FormatArg {
    Requirements,
    Pipfile,
    Poetry,
    Flit,
}

impl From<FormatArg> for FormatKey {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Requirements => FormatKey::Requirements,
            FormatArg::Pipfile => FormatKey::Pipfile,
            FormatArg::Poetry => FormatKey::Poetry,
            FormatArg::Flit => FormatKey::Flit,
        }
    }
}
