// src/lib.rs
pub mod errors;
pub mod estimate;
pub mod kmer_distr;
pub mod report;
pub mod rollup;
pub mod tree;
pub mod types;

use std::fmt::Write as FmtWrite;
use std::io::BufRead;
use std::path::PathBuf;

use crate::errors::BrackenError;
use crate::estimate::{apply_contributions, distribute_reads};
use crate::kmer_distr::KmerDistribution;
use crate::report::{open_lines, parse_report_line, ParsedLine};
use crate::rollup::{abundance_rows, bracken_report_path, regenerate_report};
use crate::tree::TreeBuilder;
use crate::types::{AbundanceRow, NewReportRow, Rank};

/// One estimation run over one report.
#[derive(Debug, Clone)]
pub struct EstimateConfig {
    pub report_path: PathBuf,
    pub kmer_distr_path: PathBuf,
    /// Rank abundance is pushed to.
    pub level: Rank,
    /// Minimum cumulative reads for a target-rank taxon to take part.
    pub threshold: u64,
}

impl EstimateConfig {
    pub fn new(report_path: impl Into<PathBuf>, kmer_distr_path: impl Into<PathBuf>) -> Self {
        EstimateConfig {
            report_path: report_path.into(),
            kmer_distr_path: kmer_distr_path.into(),
            level: Rank::Species,
            threshold: 10,
        }
    }

    /// Where the regenerated report goes: the input path with a `_bracken`
    /// suffix before the extension.
    pub fn output_report_path(&self) -> PathBuf {
        bracken_report_path(&self.report_path)
    }
}

/// Read accounting for one run. Together the buckets cover every input
/// read: kept at the target rank, moved there, discarded below the
/// threshold, impossible to attribute, or never classified at all.
#[derive(Debug, Clone)]
pub struct EstimateSummary {
    pub level: Rank,
    pub threshold: u64,
    /// Target-rank taxa seen in the report / kept after thresholding.
    pub taxa_seen: usize,
    pub taxa_kept: usize,
    /// Root cumulative reads plus unclassified reads.
    pub total_reads: u64,
    pub reads_kept: u64,
    pub reads_discarded: u64,
    pub reads_distributed: u64,
    pub reads_not_distributed: u64,
    pub unclassified_reads: u64,
    pub skipped_lines: usize,
}

impl EstimateSummary {
    pub fn log(&self) {
        log::info!(
            "abundance estimation at rank {} (threshold {})",
            self.level,
            self.threshold
        );
        log::info!(
            "taxa at rank: {} seen, {} kept",
            self.taxa_seen,
            self.taxa_kept
        );
        log::info!("total reads: {}", self.total_reads);
        log::info!("reads kept at rank: {}", self.reads_kept);
        log::info!("reads discarded (below threshold): {}", self.reads_discarded);
        log::info!("reads distributed: {}", self.reads_distributed);
        log::info!("reads not distributed: {}", self.reads_not_distributed);
        log::info!("unclassified reads: {}", self.unclassified_reads);
    }
}

/// Structured results of one run; text renditions are generated on demand.
#[derive(Debug)]
pub struct EstimationResults {
    /// Flat abundance table rows, in report order.
    pub table_rows: Vec<AbundanceRow>,

    /// Regenerated hierarchical report rows, depth-first.
    pub report_rows: Vec<NewReportRow>,

    /// The input's unclassified line, passed through verbatim.
    pub unclassified_line: Option<String>,

    pub summary: EstimateSummary,
}

impl EstimationResults {
    /// Generate the abundance table text on demand.
    pub fn get_abundance_table(&self) -> String {
        let mut output = String::new();
        output.push_str(
            "name\ttaxonomy_id\ttaxonomy_lvl\tkraken_assigned_reads\tadded_reads\tnew_est_reads\tfraction_total_reads\n",
        );
        for row in &self.table_rows {
            writeln!(
                output,
                "{}\t{}\t{}\t{}\t{}\t{}\t{:.5}",
                row.name,
                row.taxid,
                row.rank,
                row.kraken_assigned_reads,
                row.added_reads,
                row.new_est_reads,
                row.fraction_total_reads
            )
            .unwrap();
        }
        output
    }

    /// Generate the regenerated report text on demand, unclassified line first.
    pub fn get_new_report(&self) -> String {
        let mut output = String::new();
        if let Some(line) = &self.unclassified_line {
            output.push_str(line);
            output.push('\n');
        }
        for row in &self.report_rows {
            let mut indented_name = String::new();
            for _ in 0..row.depth {
                indented_name.push_str("  ");
            }
            indented_name.push_str(&row.name);

            writeln!(
                output,
                "{:.2}\t{}\t{}\t{}\t{}\t{}",
                row.pct,
                row.cumulative_reads,
                row.own_reads,
                row.rank,
                row.taxid,
                indented_name
            )
            .unwrap();
        }
        output
    }
}

/// Re-estimates per-taxon abundance at the configured rank from a
/// hierarchical classifier report and a per-genome k-mer distribution.
///
/// Pipeline: parse the report into a taxonomy tree, index the k-mer
/// distribution for the taxa in this run, redistribute ancestor-level reads
/// down to target-rank taxa, then roll the corrected counts back up into a
/// regenerated report. Nothing is written to disk here.
pub fn estimate_abundance(config: &EstimateConfig) -> Result<EstimationResults, BrackenError> {
    // 1. Parse the report and build the taxonomy tree
    let reader = open_lines(&config.report_path)?;
    let mut builder = TreeBuilder::new(config.level, config.threshold);
    let mut unclassified_line = None;
    let mut unclassified_reads = 0;
    let mut skipped_lines = 0usize;

    for line in reader.lines() {
        let line = line.map_err(|e| BrackenError::io(&config.report_path, e))?;
        match parse_report_line(&line) {
            ParsedLine::Node(record) => builder.push(record)?,
            ParsedLine::Unclassified { line, reads } => {
                unclassified_reads = reads;
                unclassified_line = Some(line);
            }
            ParsedLine::Skip => skipped_lines += 1,
        }
    }
    if skipped_lines > 0 {
        log::warn!(
            "skipped {skipped_lines} malformed line(s) in {}",
            config.report_path.display()
        );
    }

    let (tree, mut index) = builder.finish()?;
    if index.targets.is_empty() {
        return Err(BrackenError::NoTaxaAboveThreshold {
            rank: config.level,
            threshold: config.threshold,
        });
    }

    // 2. Index the k-mer distribution, pruned to this run's taxa
    let distr = KmerDistribution::from_path(&config.kmer_distr_path, &index)?;
    log::debug!("retained {} distribution entries", distr.len());

    // 3. Redistribute ancestor reads onto target-rank taxa
    let outcome = distribute_reads(&tree, config.level, &distr, &mut index);
    apply_contributions(&mut index);

    let sum_final: f64 = index.targets.values().map(|t| t.final_reads()).sum();
    if sum_final <= 0.0 {
        return Err(BrackenError::NoTaxaAboveThreshold {
            rank: config.level,
            threshold: config.threshold,
        });
    }

    // 4. Assemble both output artifacts
    let table_rows = abundance_rows(&index, config.level);
    let report_rows = regenerate_report(&tree, &index, config.level, unclassified_reads);

    let summary = EstimateSummary {
        level: config.level,
        threshold: config.threshold,
        taxa_seen: index.taxa_seen,
        taxa_kept: index.targets.len(),
        total_reads: tree.root().cumulative_reads + unclassified_reads,
        reads_kept: index.reads_at_level - index.ignored_reads,
        reads_discarded: index.ignored_reads,
        reads_distributed: outcome.distributed_reads,
        reads_not_distributed: outcome.nondistributed_reads,
        unclassified_reads,
        skipped_lines,
    };
    summary.log();

    Ok(EstimationResults {
        table_rows,
        report_rows,
        unclassified_line,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn write_inputs(tag: &str, report: &str, distribution: &str) -> (PathBuf, PathBuf) {
        let dir = std::env::temp_dir();
        let report_path = dir.join(format!("bracken_rs_{tag}.kreport"));
        let distr_path = dir.join(format!("bracken_rs_{tag}.kmer_distrib"));
        fs::write(&report_path, report).expect("Could not write test report");
        fs::write(&distr_path, distribution).expect("Could not write test distribution");
        (report_path, distr_path)
    }

    #[test]
    fn ancestor_without_own_reads_contributes_nothing() {
        let report = "100.00\t100\t0\tR\t1\troot\n\
                      50.00\t50\t0\tD\t2\t  Bacteria\n\
                      50.00\t50\t50\tS\t3\t    SpeciesA\n";
        let distribution = "mapped_taxid\tgenome_fractions\n2\t3:80:100\n";
        let (report_path, distr_path) = write_inputs("no_own_reads", report, distribution);

        let results = estimate_abundance(&EstimateConfig::new(report_path, distr_path))
            .expect("estimation failed");

        assert_eq!(results.table_rows.len(), 1);
        let row = &results.table_rows[0];
        assert_eq!(row.kraken_assigned_reads, 50);
        assert_eq!(row.added_reads, 0);
        assert_eq!(row.new_est_reads, 50);
        let table = results.get_abundance_table();
        assert!(table.contains("SpeciesA\t3\tS\t50\t0\t50\t1.00000"));
    }

    #[test]
    fn end_to_end_redistribution_and_report() {
        let report = " 20.00\t25\t25\tU\t0\tunclassified\n\
                      80.00\t100\t0\tR\t1\troot\n\
                      80.00\t100\t40\tG\t561\t  Genus\n\
                      24.00\t30\t30\tS\t562\t    SpeciesA\n\
                      24.00\t30\t30\tS\t563\t    SpeciesB\n";
        let distribution = "mapped_taxid\tgenome_fractions\n561\t562:80:100 563:20:100\n";
        let (report_path, distr_path) = write_inputs("end_to_end", report, distribution);

        let config = EstimateConfig::new(&report_path, &distr_path);
        let results = estimate_abundance(&config).expect("estimation failed");

        // equal priors, so posteriors follow the likelihoods 0.8 / 0.2
        let a = &results.table_rows[0];
        let b = &results.table_rows[1];
        assert_eq!((a.new_est_reads, a.added_reads), (62, 32));
        assert_eq!((b.new_est_reads, b.added_reads), (38, 8));
        assert!((a.fraction_total_reads - 0.62).abs() < 1e-9);

        let summary = &results.summary;
        assert_eq!(summary.total_reads, 125);
        assert_eq!(summary.reads_kept, 60);
        assert_eq!(summary.reads_distributed, 40);
        assert_eq!(summary.reads_not_distributed, 0);
        assert_eq!(summary.reads_discarded, 0);
        assert_eq!(summary.unclassified_reads, 25);

        // conservation over all buckets
        let final_sum: f64 = results
            .table_rows
            .iter()
            .map(|r| r.new_est_reads as f64)
            .sum();
        let accounted = final_sum
            + summary.reads_discarded as f64
            + summary.reads_not_distributed as f64
            + summary.unclassified_reads as f64;
        assert!((accounted - summary.total_reads as f64).abs() < 1e-6);

        let new_report = results.get_new_report();
        let mut lines = new_report.lines();
        assert_eq!(lines.next().unwrap(), " 20.00\t25\t25\tU\t0\tunclassified");
        assert_eq!(lines.next().unwrap(), "80.00\t100\t0\tR\t1\troot");
        assert_eq!(lines.next().unwrap(), "80.00\t100\t0\tG\t561\t  Genus");
        assert_eq!(lines.next().unwrap(), "49.60\t62\t62\tS\t562\t    SpeciesA");
        assert_eq!(lines.next().unwrap(), "30.40\t38\t38\tS\t563\t    SpeciesB");
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn reestimating_a_regenerated_report_adds_nothing() {
        let report = "100.00\t100\t0\tR\t1\troot\n\
                      100.00\t100\t40\tG\t561\t  Genus\n\
                       30.00\t30\t30\tS\t562\t    SpeciesA\n\
                       30.00\t30\t30\tS\t563\t    SpeciesB\n";
        let distribution = "mapped_taxid\tgenome_fractions\n561\t562:80:100 563:20:100\n";
        let (report_path, distr_path) = write_inputs("idempotent_first", report, distribution);

        let first = estimate_abundance(&EstimateConfig::new(report_path, &distr_path))
            .expect("first pass failed");

        let regenerated = std::env::temp_dir().join("bracken_rs_idempotent_second.kreport");
        fs::write(&regenerated, first.get_new_report()).expect("Could not write report");

        let second = estimate_abundance(&EstimateConfig::new(&regenerated, &distr_path))
            .expect("second pass failed");

        assert_eq!(second.summary.reads_distributed, 0);
        for (before, after) in first.table_rows.iter().zip(&second.table_rows) {
            assert_eq!(after.added_reads, 0);
            assert_eq!(after.new_est_reads, before.new_est_reads);
        }
    }

    #[test]
    fn empty_eligible_set_is_fatal() {
        let report = "100.00\t5\t0\tR\t1\troot\n\
                       100.00\t5\t5\tS\t3\t  SpeciesA\n";
        let distribution = "mapped_taxid\tgenome_fractions\n";
        let (report_path, distr_path) = write_inputs("all_below_threshold", report, distribution);

        let err = estimate_abundance(&EstimateConfig::new(report_path, distr_path)).unwrap_err();
        assert!(matches!(err, BrackenError::NoTaxaAboveThreshold { .. }));
    }
}
