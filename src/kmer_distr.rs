//src/kmer_distr.rs

use std::io::BufRead;
use std::path::Path;

use ahash::AHashMap;
use indexmap::IndexMap;

use crate::errors::BrackenError;
use crate::report::open_lines;
use crate::tree::TargetIndex;

/// Per-classification k-mer distribution:
/// classification taxid -> (candidate genome taxid -> observed fractions).
///
/// A genome recurring under the same classification appends to its fraction
/// list; consumers read the first entry. Genomes that are neither a target
/// taxon nor mapped to one are pruned while loading to bound memory.
#[derive(Debug, Default)]
pub struct KmerDistribution {
    entries: AHashMap<String, IndexMap<String, Vec<f64>>>,
}

impl KmerDistribution {
    /// Loads a distribution file: one header line, then
    /// `classification_taxid \t genome:mapped_kmers:total_kmers[ ...]` lines.
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        index: &TargetIndex,
    ) -> Result<Self, BrackenError> {
        let path = path.as_ref();
        let reader = open_lines(path)?;
        let mut distr = KmerDistribution::default();

        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| BrackenError::io(path, e))?;
            if i == 0 {
                continue; // header
            }
            distr.add_line(&line, |g| index.is_relevant(g));
        }
        Ok(distr)
    }

    /// Parses one distribution line, keeping genomes the predicate accepts.
    /// Malformed triples and zero-total triples are dropped; a line left
    /// with no genomes is dropped whole.
    pub fn add_line(&mut self, line: &str, is_relevant: impl Fn(&str) -> bool) {
        let mut fields = line.trim_end_matches(['\r', '\n']).split('\t');
        let (Some(taxid), Some(genome_list)) = (fields.next(), fields.next()) else {
            return;
        };
        let taxid = taxid.trim();
        if taxid.is_empty() {
            return;
        }

        let mut genomes: IndexMap<String, Vec<f64>> = IndexMap::new();
        for triple in genome_list.split(' ') {
            let Some((genome, fraction)) = parse_triple(triple) else {
                continue;
            };
            if !is_relevant(genome) {
                continue;
            }
            genomes.entry(genome.to_string()).or_default().push(fraction);
        }

        if !genomes.is_empty() {
            self.entries.insert(taxid.to_string(), genomes);
        }
    }

    /// Candidate genomes expected to classify at `taxid`, in file order.
    pub fn get(&self, taxid: &str) -> Option<&IndexMap<String, Vec<f64>>> {
        self.entries.get(taxid)
    }

    /// Fraction of a genome's k-mers that classify at its own taxid.
    /// A genome with no self entry is fully unique: 1.0.
    pub fn self_fraction(&self, genome: &str) -> f64 {
        self.entries
            .get(genome)
            .and_then(|genomes| genomes.get(genome))
            .and_then(|fractions| fractions.first().copied())
            .unwrap_or(1.0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// `genome:mapped:total` -> (genome, mapped/total). None when malformed or
/// the k-mer total is zero.
fn parse_triple(triple: &str) -> Option<(&str, f64)> {
    let mut it = triple.split(':');
    let genome = it.next()?;
    let mapped: f64 = it.next()?.trim().parse().ok()?;
    let total: f64 = it.next()?.trim().parse().ok()?;
    if genome.is_empty() || total <= 0.0 {
        return None;
    }
    Some((genome, mapped / total))
}
