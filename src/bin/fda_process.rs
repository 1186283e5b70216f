use std::{
    collections::{HashMap, HashSet},
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use fda_pipeline::{
    config, logging,
    processing::{BatchEntry, Pipeline, SourceKind},
    setup,
};
use serde_json::json;
use sha2::{Digest, Sha256};
use walkdir::WalkDir;

#[derive(Parser)]
#[command(
    name = "fda-process",
    about = "Extract, check, embed, and summarize FDA decision-summary documents"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Process files or directories and emit one JSON report per document.
    Run {
        /// Files or directories; directories are walked for supported extensions.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Write `<name>.json` reports here instead of JSON lines on stdout.
        #[arg(long)]
        output_dir: Option<PathBuf>,
        /// Pretty-print JSON.
        #[arg(long)]
        pretty: bool,
    },
    /// Install the tokenizer data package (run once per environment).
    Setup {
        /// Target directory (defaults to `TOKENIZER_DATA_DIR`).
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Report tool, data package, and credential status.
    Check {
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = config::init_config().context("Failed to load configuration")?;
    logging::init_tracing(true);

    match cli.command {
        Command::Run {
            paths,
            output_dir,
            pretty,
        } => run_documents(config, &paths, output_dir.as_deref(), pretty).await,
        Command::Setup { data_dir } => {
            let dir = data_dir.unwrap_or_else(|| config.tokenizer_data_dir.clone());
            let path = setup::install_tokenizer(&dir)?;
            println!("Installed tokenizer data package at {}", path.display());
            Ok(())
        }
        Command::Check { json } => check(config, json).await,
    }
}

async fn run_documents(
    config: &config::Config,
    inputs: &[PathBuf],
    output_dir: Option<&Path>,
    pretty: bool,
) -> Result<()> {
    let paths = collect_inputs(inputs)?;
    if paths.is_empty() {
        bail!("no supported documents found in the given paths");
    }
    if let Some(dir) = output_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }

    let pipeline = Pipeline::from_config(config)
        .await
        .context("Failed to initialize the document pipeline")?;
    let entries = pipeline.process_batch(&paths).await;

    let names = report_names(&entries);
    let mut failed = 0usize;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for (entry, name) in entries.iter().zip(&names) {
        if entry.outcome.is_err() {
            failed += 1;
        }
        let value = entry_json(entry)?;
        let rendered = if pretty {
            serde_json::to_string_pretty(&value)?
        } else {
            serde_json::to_string(&value)?
        };
        match output_dir {
            Some(dir) => {
                let target = dir.join(name);
                fs::write(&target, rendered.as_bytes())
                    .with_context(|| format!("Failed to write {}", target.display()))?;
            }
            None => writeln!(out, "{rendered}")?,
        }
    }
    out.flush()?;

    if failed > 0 {
        bail!("{failed} of {} documents failed", entries.len());
    }
    Ok(())
}

fn entry_json(entry: &BatchEntry) -> Result<serde_json::Value> {
    Ok(match &entry.outcome {
        Ok(report) => serde_json::to_value(report)?,
        Err(error) => json!({
            "source": entry.path.display().to_string(),
            "stage": error.stage(),
            "error": error.to_string(),
        }),
    })
}

/// One report file name per entry. Inputs sharing a file stem get a short hash of their path.
fn report_names(entries: &[BatchEntry]) -> Vec<String> {
    let stems: Vec<&str> = entries.iter().map(|entry| file_stem(&entry.path)).collect();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for stem in &stems {
        *counts.entry(*stem).or_default() += 1;
    }

    let mut used = HashSet::new();
    entries
        .iter()
        .zip(&stems)
        .map(|(entry, stem)| {
            let base = if counts[stem] > 1 {
                format!("{stem}-{}", path_digest(&entry.path))
            } else {
                (*stem).to_string()
            };
            let suffix = if entry.outcome.is_ok() { "json" } else { "error.json" };
            let mut name = format!("{base}.{suffix}");
            let mut repeat = 1;
            // The same path listed twice hashes the same.
            while !used.insert(name.clone()) {
                repeat += 1;
                name = format!("{base}-{repeat}.{suffix}");
            }
            name
        })
        .collect()
}

fn file_stem(path: &Path) -> &str {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("document")
}

fn path_digest(path: &Path) -> String {
    let digest = Sha256::digest(path.to_string_lossy().as_bytes());
    hex::encode(&digest[..4])
}

/// Expand directories into their supported files; explicit files are kept as given.
fn collect_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found = Vec::new();
            for entry in WalkDir::new(input) {
                let entry = entry.with_context(|| format!("Failed to walk {}", input.display()))?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let supported = entry
                    .path()
                    .to_str()
                    .map(|name| SourceKind::from_name(name).is_supported())
                    .unwrap_or(false);
                if supported {
                    found.push(entry.into_path());
                }
            }
            found.sort();
            paths.extend(found);
        } else {
            paths.push(input.clone());
        }
    }
    Ok(paths)
}

async fn check(config: &config::Config, as_json: bool) -> Result<()> {
    let report = setup::check_environment(config).await;
    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let mark = |ok: bool| if ok { "ok" } else { "missing" };
        println!("pdftotext      {} ({})", mark(report.pdftotext.available), report.pdftotext.tool);
        println!("soffice        {} ({})", mark(report.soffice.available), report.soffice.tool);
        println!(
            "tokenizer      {} ({})",
            mark(report.tokenizer.installed),
            report.tokenizer.path.display()
        );
        println!(
            "credential     {}",
            if report.credential_configured {
                "configured (remote summaries)"
            } else {
                "not set (local summaries)"
            }
        );
        println!(
            "embedding      {} / {}",
            report.embedding_provider, report.embedding_model
        );
        for problem in report.problems() {
            println!("- {problem}");
        }
    }
    report
        .ensure_ready()
        .context("environment is not ready to process documents")?;
    Ok(())
}
