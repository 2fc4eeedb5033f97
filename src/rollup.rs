//src/rollup.rs

use std::path::{Path, PathBuf};

use crate::tree::{TargetIndex, TaxTree};
use crate::types::{AbundanceRow, NewReportRow, Rank};

/// Flat abundance table rows, one per eligible target-rank taxon, in report
/// order. Integer columns truncate the float estimate; the fraction is of
/// the summed final estimates. The caller guarantees a nonzero sum.
pub fn abundance_rows(index: &TargetIndex, level: Rank) -> Vec<AbundanceRow> {
    let sum_final: f64 = index.targets.values().map(|t| t.final_reads()).sum();

    index
        .targets
        .values()
        .map(|t| {
            let final_reads = t.final_reads();
            let new_est = final_reads.trunc() as u64;
            AbundanceRow {
                name: t.name.clone(),
                taxid: t.taxid.clone(),
                rank: level,
                kraken_assigned_reads: t.cumulative_reads,
                added_reads: new_est - t.cumulative_reads,
                new_est_reads: new_est,
                fraction_total_reads: final_reads / sum_final,
            }
        })
        .collect()
}

/// Rebuilds a hierarchical report with corrected counts.
///
/// Every leaf resolves to the nearest enclosing eligible target-rank taxon
/// (fallback: the leaf itself with its original count); that taxon's
/// corrected total is taken once and accumulated into every ancestor up to
/// the root. Emission is depth-first with children in ascending order of
/// original cumulative reads; zero-count clades are dropped.
pub fn regenerate_report(
    tree: &TaxTree,
    index: &TargetIndex,
    level: Rank,
    unclassified_reads: u64,
) -> Vec<NewReportRow> {
    let n = tree.nodes.len();
    let mut corrected = vec![0f64; n];
    let mut visited = vec![false; n];

    for leaf in 0..n {
        if !tree.nodes[leaf].children.is_empty() {
            continue;
        }

        let mut assigned = None;
        let mut walk = Some(leaf);
        while let Some(i) = walk {
            let node = &tree.nodes[i];
            if node.rank == level.as_str() {
                if let Some(target) = index.targets.get(&node.taxid) {
                    assigned = Some((i, target.final_reads()));
                    break;
                }
            }
            walk = node.parent;
        }
        let (node_idx, total) =
            assigned.unwrap_or((leaf, tree.nodes[leaf].cumulative_reads as f64));

        if visited[node_idx] {
            continue;
        }
        visited[node_idx] = true;

        corrected[node_idx] += total;
        let mut up = tree.nodes[node_idx].parent;
        while let Some(i) = up {
            corrected[i] += total;
            up = tree.nodes[i].parent;
        }
    }

    let grand_total = corrected[TaxTree::ROOT] + unclassified_reads as f64;
    let mut rows = Vec::new();

    fn dfs(
        i: usize,
        tree: &TaxTree,
        corrected: &[f64],
        grand_total: f64,
        rows: &mut Vec<NewReportRow>,
    ) {
        if corrected[i] <= 0.0 {
            return;
        }
        let node = &tree.nodes[i];

        let children_total: f64 = node.children.iter().map(|&c| corrected[c]).sum();
        let own = (corrected[i] - children_total).max(0.0);
        let pct = if grand_total > 0.0 {
            100.0 * corrected[i] / grand_total
        } else {
            0.0
        };

        rows.push(NewReportRow {
            pct,
            cumulative_reads: corrected[i] as u64,
            own_reads: own as u64,
            rank: node.rank.clone(),
            taxid: node.taxid.clone(),
            name: node.name.clone(),
            depth: node.depth,
        });

        let mut kids = node.children.clone();
        kids.sort_by_key(|&c| tree.nodes[c].cumulative_reads);
        for child in kids {
            dfs(child, tree, corrected, grand_total, rows);
        }
    }

    dfs(TaxTree::ROOT, tree, &corrected, grand_total, &mut rows);
    rows
}

/// Output path for the regenerated report: `_bracken` slides in before the
/// input's extension (`report.txt` -> `report_bracken.txt`).
pub fn bracken_report_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("report");
    let name = match input.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}_bracken.{ext}"),
        None => format!("{stem}_bracken"),
    };
    input.with_file_name(name)
}
