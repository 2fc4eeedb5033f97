//src/tree.rs

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::errors::BrackenError;
use crate::types::{rank_index, Rank, ReportRecord};

/// One taxon in the report hierarchy. Nodes live in the `TaxTree` arena and
/// point at each other by index, so parent back-references cost nothing.
#[derive(Debug)]
pub struct TaxonNode {
    pub name: String,
    pub taxid: String,
    pub depth: usize,
    /// Rank letter, or a synthetic sub-rank code like "K1" for unranked nodes.
    pub rank: String,
    pub cumulative_reads: u64,
    pub own_reads: u64,
    pub children: Vec<usize>,
    pub parent: Option<usize>,
}

/// Arena taxonomy tree reconstructed from report indentation.
#[derive(Debug)]
pub struct TaxTree {
    pub nodes: Vec<TaxonNode>,
}

impl TaxTree {
    pub const ROOT: usize = 0;

    pub fn root(&self) -> &TaxonNode {
        &self.nodes[Self::ROOT]
    }
}

/// A taxon at the target rank that passed the read threshold.
/// `added_reads` is only written by the redistribution pass.
#[derive(Debug)]
pub struct TargetTaxon {
    pub name: String,
    pub taxid: String,
    pub cumulative_reads: u64,
    pub own_reads: u64,
    pub added_reads: f64,
}

impl TargetTaxon {
    pub fn final_reads(&self) -> f64 {
        self.cumulative_reads as f64 + self.added_reads
    }
}

/// Maps a taxon at or below the target rank to its owning target taxon.
#[derive(Debug)]
pub struct Membership {
    pub target_taxid: String,
    /// Cumulative reads classified at the member taxon.
    pub classified_reads: u64,
    /// Reads moved onto this taxon by the redistribution pass.
    pub added_reads: f64,
}

/// Eligible target taxa (in report order, which fixes output order) plus the
/// membership index for every taxon that maps to one of them.
#[derive(Debug, Default)]
pub struct TargetIndex {
    pub targets: IndexMap<String, TargetTaxon>,
    pub memberships: AHashMap<String, Membership>,
    /// Target-rank taxa seen, eligible or not.
    pub taxa_seen: usize,
    /// Cumulative reads over all target-rank taxa, eligible or not.
    pub reads_at_level: u64,
    /// Cumulative reads at target-rank taxa below the threshold.
    pub ignored_reads: u64,
}

impl TargetIndex {
    /// True when a genome id matters for this run: it is an eligible target
    /// taxon or a taxon mapped to one.
    pub fn is_relevant(&self, taxid: &str) -> bool {
        self.targets.contains_key(taxid) || self.memberships.contains_key(taxid)
    }
}

/// Streaming tree construction. Records must arrive in report order; depth
/// is the only structural signal (no lookahead).
pub struct TreeBuilder {
    level: Rank,
    threshold: u64,
    nodes: Vec<TaxonNode>,
    cursor: Option<usize>,
    index: TargetIndex,
}

impl TreeBuilder {
    pub fn new(level: Rank, threshold: u64) -> Self {
        TreeBuilder {
            level,
            threshold,
            nodes: Vec::new(),
            cursor: None,
            index: TargetIndex::default(),
        }
    }

    pub fn push(&mut self, rec: ReportRecord) -> Result<(), BrackenError> {
        // The root arrives first; its rank column is forced to 'R'.
        if rec.taxid == "1" && self.nodes.is_empty() {
            self.nodes.push(TaxonNode {
                name: rec.name,
                taxid: rec.taxid,
                depth: rec.depth,
                rank: "R".to_string(),
                cumulative_reads: rec.cumulative_reads,
                own_reads: rec.own_reads,
                children: Vec::new(),
                parent: None,
            });
            self.cursor = Some(TaxTree::ROOT);
            return Ok(());
        }

        let mut cur = self.cursor.ok_or(BrackenError::MissingRoot)?;

        // Walk the cursor up until the record slots in as a child.
        while rec.depth != self.nodes[cur].depth + 1 {
            cur = self.nodes[cur]
                .parent
                .ok_or_else(|| BrackenError::InconsistentHierarchy {
                    taxid: rec.taxid.clone(),
                    depth: rec.depth,
                })?;
        }

        let rank = if rec.rank == "-" {
            synthesize_rank(&self.nodes[cur].rank)
        } else {
            rec.rank.clone()
        };

        self.classify_record(&rec, &rank, cur);

        let idx = self.nodes.len();
        self.nodes.push(TaxonNode {
            name: rec.name,
            taxid: rec.taxid,
            depth: rec.depth,
            rank,
            cumulative_reads: rec.cumulative_reads,
            own_reads: rec.own_reads,
            children: Vec::new(),
            parent: Some(cur),
        });
        self.nodes[cur].children.push(idx);
        self.cursor = Some(idx);
        Ok(())
    }

    pub fn finish(self) -> Result<(TaxTree, TargetIndex), BrackenError> {
        if self.nodes.is_empty() {
            return Err(BrackenError::MissingRoot);
        }
        Ok((TaxTree { nodes: self.nodes }, self.index))
    }

    /// Registers target-rank taxa and membership of taxa below the target
    /// rank. `parent` is the node the record is about to attach under.
    fn classify_record(&mut self, rec: &ReportRecord, rank: &str, parent: usize) {
        if rank == self.level.as_str() {
            self.index.taxa_seen += 1;
            self.index.reads_at_level += rec.cumulative_reads;
            if rec.cumulative_reads < self.threshold {
                // Below threshold: excluded from estimation, and the
                // membership chain breaks here for its descendants.
                self.index.ignored_reads += rec.cumulative_reads;
            } else {
                self.index.targets.insert(
                    rec.taxid.clone(),
                    TargetTaxon {
                        name: rec.name.clone(),
                        taxid: rec.taxid.clone(),
                        cumulative_reads: rec.cumulative_reads,
                        own_reads: rec.own_reads,
                        added_reads: 0.0,
                    },
                );
                self.index.memberships.insert(
                    rec.taxid.clone(),
                    Membership {
                        target_taxid: rec.taxid.clone(),
                        classified_reads: rec.cumulative_reads,
                        added_reads: 0.0,
                    },
                );
            }
            return;
        }

        // Only taxa strictly below the target rank inherit membership.
        let below_target = rank
            .chars()
            .next()
            .and_then(rank_index)
            .zip(rank_index(self.level.code()))
            .map(|(r, t)| r >= t)
            .unwrap_or(false);
        if !below_target {
            return;
        }

        // Nearest target-rank ancestor, if it was registered as eligible.
        let mut walk = Some(parent);
        while let Some(i) = walk {
            let node = &self.nodes[i];
            if node.rank == self.level.as_str() {
                if let Some(owner) = self.index.targets.get(&node.taxid) {
                    let owner_taxid = owner.taxid.clone();
                    self.index.memberships.insert(
                        rec.taxid.clone(),
                        Membership {
                            target_taxid: owner_taxid,
                            classified_reads: rec.cumulative_reads,
                            added_reads: 0.0,
                        },
                    );
                }
                return;
            }
            walk = node.parent;
        }
    }
}

/// Synthetic rank code for an unranked node: "K" -> "K1", "K1" -> "K2".
fn synthesize_rank(parent_rank: &str) -> String {
    let is_primary = parent_rank.len() == 1
        && parent_rank.chars().next().and_then(rank_index).is_some();
    if is_primary {
        return format!("{parent_rank}1");
    }
    let split = parent_rank
        .find(|c: char| c.is_ascii_digit())
        .unwrap_or(parent_rank.len());
    let (head, digits) = parent_rank.split_at(split);
    let n: u64 = digits.parse().unwrap_or(0);
    format!("{head}{}", n + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(
        name: &str,
        taxid: &str,
        depth: usize,
        rank: &str,
        cumulative: u64,
        own: u64,
    ) -> ReportRecord {
        ReportRecord {
            name: name.to_string(),
            taxid: taxid.to_string(),
            depth,
            rank: rank.to_string(),
            cumulative_reads: cumulative,
            own_reads: own,
        }
    }

    fn build(records: Vec<ReportRecord>, level: Rank, threshold: u64) -> (TaxTree, TargetIndex) {
        let mut builder = TreeBuilder::new(level, threshold);
        for r in records {
            builder.push(r).unwrap();
        }
        builder.finish().unwrap()
    }

    #[test]
    fn reconstructs_parent_links_from_depth() {
        let (tree, _) = build(
            vec![
                rec("root", "1", 0, "R", 100, 0),
                rec("Bacteria", "2", 1, "D", 100, 0),
                rec("Proteobacteria", "1224", 2, "P", 60, 0),
                rec("Firmicutes", "1239", 2, "P", 40, 0),
            ],
            Rank::Species,
            10,
        );

        assert_eq!(tree.nodes.len(), 4);
        assert_eq!(tree.root().children, vec![1]);
        assert_eq!(tree.nodes[1].children, vec![2, 3]);
        assert_eq!(tree.nodes[3].parent, Some(1));
        for node in &tree.nodes {
            if let Some(p) = node.parent {
                assert_eq!(tree.nodes[p].depth + 1, node.depth);
            }
        }
    }

    #[test]
    fn synthesizes_rank_codes_for_unranked_nodes() {
        let (tree, _) = build(
            vec![
                rec("root", "1", 0, "R", 100, 0),
                rec("Bacteria", "2", 1, "K", 100, 0),
                rec("clade A", "10", 2, "-", 60, 0),
                rec("clade B", "11", 3, "-", 60, 0),
                rec("clade C", "12", 2, "-", 40, 0),
            ],
            Rank::Species,
            10,
        );

        assert_eq!(tree.nodes[2].rank, "K1");
        assert_eq!(tree.nodes[3].rank, "K2");
        // sibling of clade A starts over from the kingdom code
        assert_eq!(tree.nodes[4].rank, "K1");
        assert_eq!(synthesize_rank("K9"), "K10");
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        let (_, index) = build(
            vec![
                rec("root", "1", 0, "R", 30, 0),
                rec("Bacteria", "2", 1, "D", 30, 0),
                rec("Genus", "561", 2, "G", 30, 0),
                rec("SpeciesAt", "562", 3, "S", 10, 10),
                rec("SpeciesBelow", "563", 3, "S", 9, 9),
            ],
            Rank::Species,
            10,
        );

        assert!(index.targets.contains_key("562"));
        assert!(!index.targets.contains_key("563"));
        assert_eq!(index.taxa_seen, 2);
        assert_eq!(index.reads_at_level, 19);
        assert_eq!(index.ignored_reads, 9);
    }

    #[test]
    fn descendants_of_ineligible_targets_are_dropped() {
        let (_, index) = build(
            vec![
                rec("root", "1", 0, "R", 100, 0),
                rec("GenusA", "100", 1, "G", 60, 0),
                rec("SpeciesA", "101", 2, "S", 60, 20),
                rec("StrainA", "102", 3, "-", 40, 40),
                rec("GenusB", "200", 1, "G", 8, 0),
                rec("SpeciesB", "201", 2, "S", 8, 4),
                rec("StrainB", "202", 3, "-", 4, 4),
            ],
            Rank::Species,
            10,
        );

        // StrainA maps to SpeciesA; the sub-threshold SpeciesB chain is cut.
        assert_eq!(index.memberships["102"].target_taxid, "101");
        assert!(!index.memberships.contains_key("201"));
        assert!(!index.memberships.contains_key("202"));
        assert_eq!(index.ignored_reads, 8);
    }

    #[test]
    fn records_before_the_root_are_fatal() {
        let mut builder = TreeBuilder::new(Rank::Species, 10);
        let err = builder.push(rec("Bacteria", "2", 1, "D", 10, 0)).unwrap_err();
        assert!(matches!(err, BrackenError::MissingRoot));
    }

    #[test]
    fn depth_jumps_past_the_root_are_fatal() {
        let mut builder = TreeBuilder::new(Rank::Species, 10);
        builder.push(rec("root", "1", 0, "R", 10, 0)).unwrap();
        let err = builder.push(rec("deep", "9", 3, "S", 5, 5)).unwrap_err();
        assert!(matches!(err, BrackenError::InconsistentHierarchy { .. }));
    }
}
