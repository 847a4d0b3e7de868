mod commands;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "metamagic",
    version,
    about = "Read labelled fields from scanned documents by region"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract fields from a PDF or image
    Extract {
        /// Path to a PDF or image file
        input_file: PathBuf,

        #[command(flatten)]
        layout: commands::LayoutArgs,

        /// Output format: table (default) or json
        #[arg(short, long, default_value = "table")]
        output: String,

        /// Write results to a JSON file
        #[arg(short = 'O', long = "out", value_name = "FILE")]
        out: Option<PathBuf>,

        /// Keep every crop handed to OCR under this directory
        #[arg(long, value_name = "DIR")]
        diagnostics: Option<PathBuf>,

        /// Read the fields of a page in parallel
        #[arg(long)]
        concurrent: bool,

        #[command(flatten)]
        engine: commands::EngineArgs,
    },
    /// Check a field layout file and report every problem in it
    Validate {
        /// Path to a .toml or .json layout
        file: PathBuf,
    },
    /// Watch a folder and extract every document dropped into it
    Watch {
        /// Folder to watch
        dir: PathBuf,

        #[command(flatten)]
        layout: commands::LayoutArgs,

        #[command(flatten)]
        engine: commands::EngineArgs,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Extract {
            input_file,
            layout,
            output,
            out,
            diagnostics,
            concurrent,
            engine,
        } => {
            let opts = commands::extract::Options { output, out, diagnostics, concurrent };
            commands::extract::run(input_file, layout, engine, opts).await
        }
        Commands::Validate { file } => commands::validate::run(&file),
        Commands::Watch { dir, layout, engine } => commands::watch::run(dir, layout, engine).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
