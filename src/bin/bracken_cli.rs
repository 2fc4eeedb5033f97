use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use bracken_rs::types::Rank;
use bracken_rs::{estimate_abundance, EstimateConfig};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Bayesian re-estimation of per-taxon abundance from a kraken report"
)]
struct Args {
    /// Input kraken report file (.gz supported)
    #[arg(short, long)]
    input: PathBuf,

    /// Kmer distribution file for the database the report was built with
    #[arg(short, long)]
    kmer_distr: PathBuf,

    /// Output abundance table
    #[arg(short, long)]
    output: PathBuf,

    /// Rank to push all reads to (K, P, C, O, F, G, S)
    #[arg(short, long, default_value = "S")]
    level: Rank,

    /// Minimum reads a taxon needs at the chosen rank to receive estimates
    #[arg(short, long, default_value_t = 10)]
    threshold: u64,
}

fn spinner(color: &str, msg: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&[
                "⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏",
            ])
            .template(&format!("{{spinner:.{color}}} {{msg}}"))
            .expect("Invalid spinner template"),
    );
    bar.set_message(msg.to_string());
    bar
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let config = EstimateConfig {
        report_path: args.input,
        kmer_distr_path: args.kmer_distr,
        level: args.level,
        threshold: args.threshold,
    };

    // 1. Parse inputs and run the estimation
    let bar = spinner("green", "Estimating abundances...");
    let results = match estimate_abundance(&config) {
        Ok(results) => results,
        Err(e) => {
            bar.finish_with_message("Estimation failed.");
            log::error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    bar.finish_with_message(format!(
        "Estimated {} taxa at rank {} ({} reads distributed, {} not distributed).",
        results.summary.taxa_kept,
        results.summary.level,
        results.summary.reads_distributed,
        results.summary.reads_not_distributed,
    ));

    // 2. Write both artifacts, fully rendered, only now that estimation is done
    let bar = spinner("yellow", "Writing output files...");
    let new_report_path = config.output_report_path();

    if let Err(e) = fs::write(&args.output, results.get_abundance_table()) {
        bar.finish_with_message("Write failed.");
        log::error!("could not write {}: {e}", args.output.display());
        return ExitCode::FAILURE;
    }
    if let Err(e) = fs::write(&new_report_path, results.get_new_report()) {
        bar.finish_with_message("Write failed.");
        log::error!("could not write {}: {e}", new_report_path.display());
        return ExitCode::FAILURE;
    }
    bar.finish_with_message(format!(
        "Wrote {} and {}.",
        args.output.display(),
        new_report_path.display()
    ));

    ExitCode::SUCCESS
}
