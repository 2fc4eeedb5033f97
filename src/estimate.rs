//src/estimate.rs

use std::collections::VecDeque;

use crate::kmer_distr::KmerDistribution;
use crate::tree::{TargetIndex, TaxTree};
use crate::types::Rank;

/// Read totals accounted by the redistribution pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct DistributionOutcome {
    /// Own-rank reads of ancestor nodes moved down to target-rank taxa.
    pub distributed_reads: u64,
    /// Own-rank reads with no usable distribution signal (no entry for the
    /// node, or zero prior/posterior mass over its candidates).
    pub nondistributed_reads: u64,
}

/// Redistributes own-rank reads of every ancestor node onto candidate
/// target-rank genomes, breadth-first from the root.
///
/// For a node with reads classified exactly at it, each candidate genome g
/// listed under the node's distribution entry gets
/// `posterior(g) ∝ likelihood(g) * prior(g)` where the likelihood is the
/// fraction of g's k-mers expected to classify at the node and the prior is
/// proportional to the estimated true read count of g (uniquely classified
/// reads scaled by 1/selfFraction). The posterior is normalized before
/// multiplying, so one node always hands out exactly its own reads.
pub fn distribute_reads(
    tree: &TaxTree,
    level: Rank,
    distr: &KmerDistribution,
    index: &mut TargetIndex,
) -> DistributionOutcome {
    let mut outcome = DistributionOutcome::default();
    let mut queue = VecDeque::new();
    queue.push_back(TaxTree::ROOT);

    while let Some(i) = queue.pop_front() {
        let node = &tree.nodes[i];

        // Target-rank nodes absorb reads; estimation never descends through them.
        for &child in &node.children {
            if tree.nodes[child].rank != level.as_str() {
                queue.push_back(child);
            }
        }

        if node.own_reads == 0 {
            continue;
        }
        let Some(candidates) = distr.get(&node.taxid) else {
            outcome.nondistributed_reads += node.own_reads;
            continue;
        };

        // Estimated true read count per candidate genome.
        let mut prelim: Vec<(&str, f64, f64)> = Vec::with_capacity(candidates.len());
        let mut genome_reads_total = 0.0;
        for (genome, fractions) in candidates {
            let Some(membership) = index.memberships.get(genome.as_str()) else {
                continue;
            };
            let self_fraction = distr.self_fraction(genome);
            if self_fraction <= 0.0 {
                continue;
            }
            let est_reads = membership.classified_reads as f64 / self_fraction;
            genome_reads_total += est_reads;
            prelim.push((genome.as_str(), fractions[0], est_reads));
        }
        if genome_reads_total <= 0.0 {
            outcome.nondistributed_reads += node.own_reads;
            continue;
        }

        let mut posterior: Vec<(&str, f64)> = Vec::with_capacity(prelim.len());
        let mut total_probability = 0.0;
        for (genome, likelihood, est_reads) in prelim {
            let p = likelihood * (est_reads / genome_reads_total);
            total_probability += p;
            posterior.push((genome, p));
        }
        if total_probability <= 0.0 {
            outcome.nondistributed_reads += node.own_reads;
            continue;
        }

        for (genome, p) in posterior {
            let added = p / total_probability * node.own_reads as f64;
            if let Some(membership) = index.memberships.get_mut(genome) {
                membership.added_reads += added;
            }
        }
        outcome.distributed_reads += node.own_reads;
    }

    outcome
}

/// Folds every membership's accumulated contribution into its owning target
/// record. Contributions sum, so the pass is order-independent.
pub fn apply_contributions(index: &mut TargetIndex) {
    let additions: Vec<(String, f64)> = index
        .memberships
        .values()
        .filter(|m| m.added_reads != 0.0)
        .map(|m| (m.target_taxid.clone(), m.added_reads))
        .collect();

    for (target_taxid, added) in additions {
        if let Some(target) = index.targets.get_mut(&target_taxid) {
            target.added_reads += added;
        }
    }
}
