//! Input format detection.
//!
//! The sorter handles BED, VCF and GFF/GTF. VCF declares itself through its
//! header; BED and GFF/GTF are told apart by which columns hold a valid
//! `0 <= start <= end` interval. GFF and GTF share key columns and are
//! treated as one format.

use std::io::{self, BufRead, Cursor, Read};

use crate::error::{Result, SortError};

/// Maximum number of lines the sniffer will consume before giving up.
pub const SNIFF_MAX_LINES: usize = 50_000;

/// Detection order for column-based formats.
const CHECK_ORDER: [Format; 2] = [Format::Bed, Format::Gff];

/// A supported tab-delimited interval format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// BED: chrom, start, end in columns 0, 1, 2 (0-based start).
    Bed,
    /// VCF: chrom, pos in columns 0, 1; end inferred from REF/ALT/INFO.
    Vcf,
    /// GFF/GTF: seqname, start, end in columns 0, 3, 4 (1-based).
    Gff,
}

impl Format {
    /// Column holding the chromosome name.
    #[inline]
    pub fn chrom_col(self) -> usize {
        0
    }

    /// Column holding the start position.
    #[inline]
    pub fn start_col(self) -> usize {
        match self {
            Format::Bed | Format::Vcf => 1,
            Format::Gff => 3,
        }
    }

    /// Column holding the end position, if the format has one.
    /// VCF has no end column; its end is inferred per record.
    #[inline]
    pub fn end_col(self) -> Option<usize> {
        match self {
            Format::Bed => Some(2),
            Format::Gff => Some(4),
            Format::Vcf => None,
        }
    }

    /// How many tab-separated tokens key extraction needs. The last token
    /// keeps the remainder of the line, so one extra past the highest
    /// index that is read. VCF reads REF (3), ALT (4) and INFO (7).
    #[inline]
    pub(crate) fn split_limit(self) -> usize {
        match self {
            Format::Bed => 4,
            Format::Gff => 6,
            Format::Vcf => 9,
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Bed => write!(f, "BED"),
            Format::Vcf => write!(f, "VCF"),
            Format::Gff => write!(f, "GFF/GTF"),
        }
    }
}

/// Classify the format of a stream by peeking at its prefix.
///
/// Consumes header lines (and the first record line) up to
/// [`SNIFF_MAX_LINES`], then returns the detected format together with a
/// reader that replays the consumed bytes followed by the rest of the
/// stream. Reaching EOF or the line cap without seeing a record is an
/// error, as is a first record that matches no known format.
pub fn sniff<R: BufRead>(mut rdr: R) -> Result<(Format, io::Chain<Cursor<Vec<u8>>, R>)> {
    let mut consumed: Vec<u8> = Vec::new();
    let mut format: Option<Format> = None;
    let mut nlines = 0;

    while nlines < SNIFF_MAX_LINES {
        let start = consumed.len();
        if rdr.read_until(b'\n', &mut consumed)? == 0 {
            break;
        }
        nlines += 1;
        let line = &consumed[start..];

        if line[0] == b'#' {
            if line.starts_with(b"##fileformat=VCF") || line.starts_with(b"#CHROM\tPOS\tID") {
                format = Some(Format::Vcf);
                break;
            }
            continue;
        }

        // first non-comment line decides between the column formats
        let toks: Vec<&[u8]> = line.split(|&b| b == b'\t').collect();
        if toks.len() < 3 {
            return Err(SortError::InputFormat(
                "file has fewer than 3 columns".to_string(),
            ));
        }
        for candidate in CHECK_ORDER {
            if columns_match(candidate, &toks) {
                format = Some(candidate);
                break;
            }
        }
        match format {
            Some(_) => break,
            None => {
                return Err(SortError::InputFormat(format!(
                    "unknown file format: {}",
                    String::from_utf8_lossy(line).trim_end()
                )));
            }
        }
    }

    let format = format.ok_or_else(|| {
        SortError::InputFormat("no records found while detecting file format".to_string())
    })?;
    Ok((format, Cursor::new(consumed).chain(rdr)))
}

/// Check whether the candidate format's start/end columns hold a valid
/// interval (`0 <= start <= end`) on this line.
fn columns_match(format: Format, toks: &[&[u8]]) -> bool {
    let start_col = format.start_col();
    let end_col = format.end_col().expect("sniff candidates have end columns");
    if end_col >= toks.len() {
        return false;
    }

    let start = match parse_field(toks[start_col]) {
        Some(v) => v,
        None => return false,
    };
    let end = match parse_field(toks[end_col]) {
        Some(v) => v,
        None => return false,
    };
    0 <= start && start <= end
}

fn parse_field(tok: &[u8]) -> Option<i64> {
    let tok = trim_line_ending(tok);
    std::str::from_utf8(tok).ok()?.parse().ok()
}

/// Strip a trailing `\n` / `\r\n` from a token that ended the line.
pub(crate) fn trim_line_ending(tok: &[u8]) -> &[u8] {
    let mut end = tok.len();
    while end > 0 && (tok[end - 1] == b'\n' || tok[end - 1] == b'\r') {
        end -= 1;
    }
    &tok[..end]
}
