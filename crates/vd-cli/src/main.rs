//! `vd`: headless document checks, normalisation and export.
//!
//!   vd check drawing.svg other.svg
//!   vd fmt --in-place drawing.svg
//!   vd export drawing.svg -o drawing.png --width 512

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use vd_core::{Document, LintSeverity, lint_svg};
use vd_editor::{ExportFormat, ExportOptions, Settings};

#[derive(Parser, Debug)]
#[command(name = "vd", version, about = "Vector Draft document tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report duplicate ids, misplaced layers, bad paths and dangling references.
    Check {
        #[arg(required = true, num_args = 1..)]
        files: Vec<PathBuf>,
    },

    /// Re-emit a document in canonical form.
    Fmt {
        file: PathBuf,

        /// Overwrite the input instead of printing to stdout.
        #[arg(short, long)]
        in_place: bool,
    },

    /// Export to PNG or PDF (format taken from the output extension).
    Export {
        file: PathBuf,

        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        #[arg(long)]
        width: Option<u32>,

        #[arg(long)]
        height: Option<u32>,

        #[arg(long)]
        dpi: Option<f64>,

        /// Editor settings (JSON); supplies the converter command.
        #[arg(long, value_name = "SETTINGS.json")]
        settings: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    match run(cli.command) {
        Ok(code) => code,
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<ExitCode, String> {
    match command {
        Command::Check { files } => {
            let mut failed = false;
            for file in &files {
                failed |= check(file)?;
            }
            Ok(if failed { ExitCode::FAILURE } else { ExitCode::SUCCESS })
        }
        Command::Fmt { file, in_place } => {
            let mut doc = Document::load(&file).map_err(|e| e.to_string())?;
            if in_place {
                doc.save(&file).map_err(|e| e.to_string())?;
                log::info!("formatted {}", file.display());
            } else {
                print!("{}", doc.to_svg());
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Export {
            file,
            output,
            width,
            height,
            dpi,
            settings,
        } => {
            let format = ExportFormat::from_extension(&output)
                .ok_or_else(|| format!("cannot export to {}: use .png or .pdf", output.display()))?;
            let settings = match settings {
                Some(path) => Settings::load(&path).map_err(|e| e.to_string())?,
                None => Settings::default(),
            };
            let doc = Document::load(&file).map_err(|e| e.to_string())?;
            let opts = ExportOptions { width, height, dpi };
            vd_editor::export::export(&doc, &settings.export_command, format, &output, &opts)
                .map_err(|e| e.to_string())?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Print diagnostics for one file. Returns whether any is an error.
fn check(file: &Path) -> Result<bool, String> {
    let text = std::fs::read_to_string(file).map_err(|e| format!("{}: {e}", file.display()))?;
    let diags = match lint_svg(&text) {
        Ok(diags) => diags,
        Err(e) => {
            println!("{}: error: {e}", file.display());
            return Ok(true);
        }
    };
    for d in &diags {
        let level = match d.severity {
            LintSeverity::Error => "error",
            LintSeverity::Warning => "warning",
            LintSeverity::Info => "info",
        };
        println!("{}: {level}[{}] {}: {}", file.display(), d.rule, d.node_id, d.message);
    }
    log::debug!("{}: {} diagnostics", file.display(), diags.len());
    Ok(diags.iter().any(|d| d.severity == LintSeverity::Error))
}
