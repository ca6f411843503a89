// Solo Accompaniment Harmonizer: CLI entry point.
//
// Subcommands:
//   accomp harmonize <PATH>            harmonize a melody file, or every melody under a folder
//   accomp extract <ROOT> [--output F] build the chord-feature CSV from harmonized pieces
//   accomp triads <KEY>                show the diatonic triads and candidate keys of a key
//
// Global flags: --config FILE (JSON PipelineConfig), -v (debug logging).
// RUST_LOG overrides the log filter.

use clap::{Parser, Subcommand};
use solo_accomp_harmony::config::PipelineConfig;
use solo_accomp_harmony::corpus::aggregate_directory;
use solo_accomp_harmony::key::Key;
use solo_accomp_harmony::modulation::candidates;
use solo_accomp_harmony::pipeline::harmonize_path;
use solo_accomp_harmony::triads::build_triads;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "accomp", about = "Harmonize solo melodies and extract chord features")]
#[command(version)]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Add an accompaniment to a melody file or to every melody under a folder
    Harmonize {
        /// A .json/.mid melody, or a folder to search recursively
        path: PathBuf,
    },

    /// Encode every harmonized piece under a folder into a training table
    Extract {
        /// Corpus folder to search recursively
        root: PathBuf,

        /// CSV file to write
        #[arg(long, default_value = "training_table.csv")]
        output: PathBuf,
    },

    /// Print the diatonic triads and modulation candidates of a key
    Triads {
        /// Key name, e.g. "G major" or "F# minor"
        key: Key,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter)).init();

    let config = match &cli.config {
        Some(path) => PipelineConfig::load(path).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }),
        None => PipelineConfig::default(),
    };

    match cli.command {
        Command::Harmonize { path } => {
            let report = harmonize_path(&path, &config);
            println!("Harmonized {} piece(s), skipped {}.", report.outputs.len(), report.failures.len());
            for output in &report.outputs {
                println!("  {} ({}, {} chords)", output.paths.midi.display(), output.key, output.chords);
            }
            for failure in &report.failures {
                println!("  skipped {}", failure);
            }
            if report.outputs.is_empty() && !report.failures.is_empty() {
                std::process::exit(1);
            }
        }
        Command::Extract { root, output } => {
            let report = aggregate_directory(&root, &config.corpus);
            if let Err(e) = report.table.save(&output) {
                eprintln!("Error writing {}: {}", output.display(), e);
                std::process::exit(1);
            }
            println!(
                "Wrote {} rows from {} piece(s) to {} ({} piece(s) skipped, {} row(s) dropped).",
                report.table.len(),
                report.pieces,
                output.display(),
                report.failures.len(),
                report.skipped_rows
            );
            for failure in &report.failures {
                println!("  skipped {}", failure);
            }
        }
        Command::Triads { key } => print_triads(&key),
    }
}

fn print_triads(key: &Key) {
    println!("{} (signature {:+})", key, key.signature());
    for triad in build_triads(key) {
        println!("  {:<5} {}", triad.label, triad.triad);
    }
    println!("Candidate keys:");
    for candidate in candidates(key) {
        println!("  {:<12} {}", candidate.relation.to_string(), candidate.key);
    }
}
