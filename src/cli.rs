use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "ooxpack")]
#[command(version)]
#[command(about = "Inspect and edit Office Open XML packages", long_about = None)]
#[command(after_help = "Examples:\n  \
  ooxpack deck.pptx list -v                          list parts with sizes\n  \
  ooxpack deck.pptx set-colors 1F2937 F9FAFB 374151 E5E7EB 2563EB DB2777\n  \
  ooxpack deck.pptx -o out.pptx apply-theme \"https://coolors.co/edd3c4-c8adc0-7765e3-3b60e4-080708 and Merriweather/Inter fonts\"\n  \
  ooxpack new.pptx new --major Georgia --minor Arial")]
pub struct Cli {
    /// Package file (.pptx, .docx, .xlsx)
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    #[command(subcommand)]
    pub command: Command,

    /// JSON configuration file
    #[arg(short = 'c', long, value_name = "CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Remote compression service, used when the local codec cannot cope
    #[arg(long, value_name = "URL", global = true)]
    pub remote: Option<String>,

    /// DEFLATE level for rewritten parts (0-9)
    #[arg(long, value_name = "N", global = true)]
    pub level: Option<u32>,

    /// Write the result here instead of replacing FILE
    #[arg(short = 'o', long, value_name = "OUT", global = true)]
    pub output: Option<PathBuf>,

    /// More log output (-vv => debug)
    #[arg(short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Errors only
    #[arg(short = 'q', global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the parts in the package
    List,
    /// Print the theme's colors and fonts
    Theme,
    /// Replace the theme palette (12 values, or 6-8 starting at accent1)
    SetColors {
        #[arg(value_name = "HEX", required = true)]
        colors: Vec<String>,
    },
    /// Replace the heading and body fonts
    SetFonts { major: String, minor: String },
    /// Apply a palette URL and font pair taken from free text
    ApplyTheme { prompt: String },
    /// Replace text in every XML part
    ReplaceText { search: String, replace: String },
    /// Check relationships and content types
    Validate,
    /// List the operations available by name
    Ops,
    /// Create a blank presentation at FILE
    New {
        #[arg(long, value_name = "HEX", num_args = 1..)]
        colors: Vec<String>,
        #[arg(long)]
        major: Option<String>,
        #[arg(long)]
        minor: Option<String>,
    },
    /// Invoke an operation by name with JSON arguments
    Call {
        name: String,
        #[arg(value_name = "JSON", default_value = "{}")]
        args: String,
    },
}

impl Cli {
    /// Log filter used when RUST_LOG is unset.
    pub fn log_level(&self) -> &'static str {
        match (self.quiet, self.verbose) {
            (true, _) => "error",
            (false, 0) => "warn",
            (false, 1) => "info",
            (false, _) => "debug",
        }
    }

    pub fn output_path(&self) -> &PathBuf {
        self.output.as_ref().unwrap_or(&self.file)
    }

    /// Whether FILE is read before the command runs.
    pub fn reads_input(&self) -> bool {
        !matches!(self.command, Command::New { .. } | Command::Ops)
    }
}
