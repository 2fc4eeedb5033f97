//src/report.rs

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::errors::BrackenError;
use crate::types::ReportRecord;

/// Outcome of parsing one report line.
#[derive(Debug)]
pub enum ParsedLine {
    /// A taxon line, ready for tree construction.
    Node(ReportRecord),
    /// The unclassified line ('U' rank); kept verbatim, never a tree node.
    Unclassified { line: String, reads: u64 },
    /// Malformed line (missing columns, non-numeric reads). Ignored.
    Skip,
}

/// Opens a report or distribution file, transparently decompressing `.gz`.
pub fn open_lines<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>, BrackenError> {
    let path = path.as_ref();
    let f = File::open(path).map_err(|e| BrackenError::io(path, e))?;

    let is_gz = path
        .extension()
        .map(|ext| ext == "gz")
        .unwrap_or(false);

    if is_gz {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(f))))
    } else {
        Ok(Box::new(BufReader::new(f)))
    }
}

/// Parses one kraken-style report line:
/// `percent \t cumulative_reads \t own_reads \t rank \t taxid \t indented name`.
///
/// Rank, taxid and name are taken from the end of the line, so report
/// variants with extra columns between the read counts and the rank still
/// parse. Depth is the number of leading two-space units on the name.
pub fn parse_report_line(line: &str) -> ParsedLine {
    let trimmed = line.trim_end_matches(['\r', '\n']);
    let fields: Vec<&str> = trimmed.split('\t').collect();
    if fields.len() < 6 {
        return ParsedLine::Skip;
    }

    let cumulative_reads: u64 = match fields[1].trim().parse() {
        Ok(v) => v,
        Err(_) => return ParsedLine::Skip,
    };
    let own_reads: u64 = match fields[2].trim().parse() {
        Ok(v) => v,
        Err(_) => return ParsedLine::Skip,
    };

    let rank = fields[fields.len() - 3].trim();
    let taxid = fields[fields.len() - 2].trim();
    let raw_name = fields[fields.len() - 1];

    if rank == "U" {
        return ParsedLine::Unclassified {
            line: trimmed.to_string(),
            reads: cumulative_reads,
        };
    }

    let name = raw_name.trim_start_matches(' ');
    let spaces = raw_name.len() - name.len();

    ParsedLine::Node(ReportRecord {
        name: name.to_string(),
        taxid: taxid.to_string(),
        depth: spaces / 2,
        rank: rank.to_string(),
        cumulative_reads,
        own_reads,
    })
}
