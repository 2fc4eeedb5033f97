//src/types.rs

use std::fmt;
use std::str::FromStr;

/// Rank codes of the main taxonomic levels, in root-to-leaf order.
/// Unranked nodes get a synthetic code derived from these ("K1", "K2", ...).
pub const MAIN_RANKS: [char; 9] = ['R', 'K', 'D', 'P', 'C', 'O', 'F', 'G', 'S'];

/// Position of a rank letter within `MAIN_RANKS`, if it is one.
pub fn rank_index(code: char) -> Option<usize> {
    MAIN_RANKS.iter().position(|&c| c == code)
}

/// The taxonomic level abundance is estimated at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rank {
    Kingdom,
    Phylum,
    Class,
    Order,
    Family,
    Genus,
    Species,
}

impl Rank {
    /// Single-letter code as it appears in the rank column of a report.
    pub fn code(&self) -> char {
        match self {
            Rank::Kingdom => 'K',
            Rank::Phylum => 'P',
            Rank::Class => 'C',
            Rank::Order => 'O',
            Rank::Family => 'F',
            Rank::Genus => 'G',
            Rank::Species => 'S',
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::Kingdom => "K",
            Rank::Phylum => "P",
            Rank::Class => "C",
            Rank::Order => "O",
            Rank::Family => "F",
            Rank::Genus => "G",
            Rank::Species => "S",
        }
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rank {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "K" | "k" => Ok(Rank::Kingdom),
            "P" | "p" => Ok(Rank::Phylum),
            "C" | "c" => Ok(Rank::Class),
            "O" | "o" => Ok(Rank::Order),
            "F" | "f" => Ok(Rank::Family),
            "G" | "g" => Ok(Rank::Genus),
            "S" | "s" => Ok(Rank::Species),
            other => Err(format!(
                "invalid rank {other:?}, expected one of K, P, C, O, F, G, S"
            )),
        }
    }
}

/// One report line flattened into its fields, indentation already decoded.
#[derive(Debug, Clone)]
pub struct ReportRecord {
    pub name: String,
    pub taxid: String,
    /// Tree depth derived from the indentation of the name column.
    pub depth: usize,
    /// Rank column as read; "-" means unranked.
    pub rank: String,
    /// Reads classified at this taxon or below.
    pub cumulative_reads: u64,
    /// Reads classified at exactly this taxon.
    pub own_reads: u64,
}

/// One row of the flat abundance table, per eligible target-rank taxon.
#[derive(Debug, Clone)]
pub struct AbundanceRow {
    pub name: String,
    pub taxid: String,
    pub rank: Rank,
    pub kraken_assigned_reads: u64,
    pub added_reads: u64,
    pub new_est_reads: u64,
    pub fraction_total_reads: f64,
}

/// One row of the regenerated hierarchical report.
#[derive(Debug, Clone)]
pub struct NewReportRow {
    pub pct: f64,
    pub cumulative_reads: u64,
    pub own_reads: u64,
    pub rank: String,
    pub taxid: String,
    pub name: String,
    pub depth: usize,
}
