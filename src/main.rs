//! folio - build EPUB files from JSON book descriptions

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::info;
use simplelog::{Config, LevelFilter, TermLogger};

use folio::io::Storage;
use folio::{Assembly, BookSpec, BuildConfig, BuildOutput};

#[derive(Parser)]
#[command(name = "folio")]
#[command(version, about = "Build EPUB files from JSON book descriptions", long_about = None)]
#[command(after_help = "EXAMPLES:
    folio book.json                      Build into the current directory
    folio book.json -o out/book.epub     Choose the archive path
    folio book.json --stdout > b.epub    Build in memory and write to stdout")]
struct Cli {
    /// Book description (JSON)
    #[arg(value_name = "BOOK")]
    input: PathBuf,

    /// Output directory, or a path ending in .epub
    #[arg(short, long, value_name = "PATH", default_value = ".")]
    output: PathBuf,

    /// Build in memory and write the archive to stdout
    #[arg(long, conflicts_with_all = ["output", "no_archive", "clean"])]
    stdout: bool,

    /// Leave the unzipped book tree instead of an archive
    #[arg(long)]
    no_archive: bool,

    /// Deflate level (0-9)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(i64).range(0..=9))]
    level: Option<i64>,

    /// Remove the working tree once the archive is written
    #[arg(long, conflicts_with = "no_archive")]
    clean: bool,

    /// More output per occurrence
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Error,
        1 => LevelFilter::Warn,
        2 => LevelFilter::Info,
        3 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    // Only fails if a logger is already installed.
    let _ = TermLogger::init(
        level,
        Config::default(),
        simplelog::TerminalMode::Stderr,
        simplelog::ColorChoice::Auto,
    );

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), String> {
    let json = std::fs::read_to_string(&cli.input)
        .map_err(|e| format!("{}: {e}", cli.input.display()))?;
    let spec: BookSpec =
        serde_json::from_str(&json).map_err(|e| format!("{}: {e}", cli.input.display()))?;

    let mut config = if cli.stdout {
        BuildConfig::memory()
    } else {
        BuildConfig::for_path(&cli.output).with_archive(!cli.no_archive)
    };
    if let Some(level) = cli.level {
        config = config.with_compression_level(level);
    }

    let mut assembly = Assembly::new(spec, config).map_err(|e| e.to_string())?;
    let output = assembly.build().await.map_err(|e| e.to_string())?;

    match output {
        BuildOutput::Bytes(bytes) => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes).map_err(|e| e.to_string())?;
            stdout.flush().map_err(|e| e.to_string())?;
        }
        BuildOutput::Archive(path) => {
            if cli.clean {
                assembly
                    .storage()
                    .remove_all()
                    .await
                    .map_err(|e| e.to_string())?;
                info!("Removed working tree of build {}", assembly.build_id());
            }
            println!("{}", path.display());
        }
        BuildOutput::Tree(path) => println!("{}", path.display()),
    }

    Ok(())
}
