use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use csutils::config::Settings;
use csutils::filename::{file_extension_from_path, is_valid_filename, sanitize_filename, SanitizeOptions};
use csutils::query::{parse_query_object, parse_query_string};
use csutils::shape::Shape;
use csutils::{Result, UtilsError};

#[derive(Parser, Debug)]
#[command(name = "csutils", version, about = "Safe filenames and typed query strings")]
pub struct Cli {
    /// Settings file, with or without extension
    #[arg(long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Print a safe filename
    Sanitize {
        name: String,
        /// Overrides filename.replacement from the settings
        replacement: Option<String>,
    },
    /// Exit 0 if the name is already a safe filename
    Check { name: String },
    /// Print the extension of a path, or 'unknown'
    Ext { path: String },
    /// Coerce a query string with a JSON shape descriptor
    Query { query: String, shape: String },
}

fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(settings: &Settings, cmd: Command) -> Result<ExitCode> {
    match cmd {
        Command::Sanitize { name, replacement } => {
            let options = replacement.map_or_else(|| settings.sanitize_options(), SanitizeOptions::with_replacement);
            println!("{}", sanitize_filename(&name, &options));
        }
        Command::Check { name } => {
            let valid = is_valid_filename(&name);
            info!(%name, valid, "checked filename");
            return Ok(if valid { ExitCode::SUCCESS } else { ExitCode::FAILURE });
        }
        Command::Ext { path } => {
            println!("{}", file_extension_from_path(&path));
        }
        Command::Query { query, shape } => {
            let shape = Shape::from_json_str(&shape)?;
            let parsed = parse_query_object(&parse_query_string(&query), &shape);
            println!("{}", serde_json::to_string_pretty(&parsed)?);
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
    // usage errors exit with status 2
    let cli = Cli::parse();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&settings);

    match run(&settings, cli.cmd) {
        Ok(code) => code,
        Err(e @ UtilsError::Shape { .. }) | Err(e @ UtilsError::Json(_)) => {
            eprintln!("invalid shape: {}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}
