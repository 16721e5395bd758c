//! Command-line host for the cover renderer.

use crate::commands::{self, CliError};
use crate::config::RendererConfig;
use crate::screen::ScreenSize;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "cover-render")]
#[command(about = "Render the cover page of a PDF for an image viewer")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Screen resolution to fit, e.g. 2560x1440 (default: primary display)
    #[arg(long, global = true)]
    screen: Option<ScreenSize>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the cover page to a PNG
    Render {
        /// Input PDF (path, file:// URL or percent-encoded path)
        input: String,

        /// Output PNG file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the size the cover would be rendered at
    Info {
        /// Input PDF (path, file:// URL or percent-encoded path)
        input: String,
    },
}

/// Exit code when the cover exceeded the memory limits.
const EXIT_OUT_OF_MEMORY: u8 = 2;

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let result = load_config(cli.config.as_deref()).and_then(|config| match &cli.command {
        Commands::Render { input, output } => {
            commands::render(input, output.as_deref(), cli.screen, &config)
                .map(|summary| report(&summary, cli.json, |s| {
                    format!("{}x{} cover written to {}", s.width, s.height, s.output.display())
                }))
        }
        Commands::Info { input } => commands::info(input, cli.screen, &config).map(|info| {
            report(&info, cli.json, |i| {
                format!(
                    "{} page(s), cover {:.0}x{:.0}pt -> {}x{} at {:.1} DPI (screen {})",
                    i.page_count, i.page.width, i.page.height, i.width, i.height, i.dpi, i.screen
                )
            })
        }),
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if cli.json {
                println!("{}", serde_json::json!({ "error": err }));
            } else {
                eprintln!("Error: {}", err);
            }
            if err.is_out_of_memory() {
                ExitCode::from(EXIT_OUT_OF_MEMORY)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<RendererConfig, CliError> {
    match path {
        Some(path) => Ok(RendererConfig::load(path)?),
        None => Ok(RendererConfig::default()),
    }
}

fn report<T: Serialize>(value: &T, json: bool, text: impl Fn(&T) -> String) {
    if json {
        match serde_json::to_string_pretty(value) {
            Ok(out) => println!("{}", out),
            Err(e) => eprintln!("Failed to serialize output: {}", e),
        }
    } else {
        println!("{}", text(value));
    }
}
