//! Sort key extraction.
//!
//! Each record line is decorated with a small integer triple
//! `(chromosome rank, start, end)`; the derived ordering on [`SortKey`] is
//! the strict comparator used by chunk sorting and the merge heap.

use memchr::memmem;

use crate::error::{Result, SortError};
use crate::format::{trim_line_ending, Format};
use crate::genome::Genome;

/// Decorated key for one record: genome rank of the chromosome, start and
/// end coordinates. Lexicographic `Ord` over the fields in that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SortKey {
    pub chrom: u32,
    pub start: i64,
    pub end: i64,
}

/// Extract the sort key from a raw line.
///
/// `line_no` is the 1-based input line number used in error messages; pass
/// 0 when it is not known (e.g. when re-keying spilled lines during the
/// merge, which only sees lines that already keyed successfully).
pub fn extract_key(line: &[u8], format: Format, genome: &Genome, line_no: u64) -> Result<SortKey> {
    let toks = split_tabs(line, format.split_limit());

    let chrom_tok = column(&toks, format.chrom_col(), line_no)?;
    let chrom_name = std::str::from_utf8(trim_line_ending(chrom_tok)).map_err(|_| {
        SortError::Parse {
            line: line_no,
            message: "chromosome name is not valid UTF-8".to_string(),
        }
    })?;
    let chrom = genome
        .rank(chrom_name)
        .ok_or_else(|| SortError::UnknownSequence {
            name: chrom_name.to_string(),
        })?;

    let start = parse_int(column(&toks, format.start_col(), line_no)?, "start", line_no)?;
    if start < 0 {
        return Err(SortError::Parse {
            line: line_no,
            message: format!("negative start position: {}", start),
        });
    }

    let end = match format.end_col() {
        Some(col) => parse_int(column(&toks, col, line_no)?, "end", line_no)?,
        None => vcf_end(&toks, start, line_no)?,
    };

    Ok(SortKey { chrom, start, end })
}

/// Infer the end coordinate of a VCF record.
///
/// Symbolic structural alleles (`<DEL`, `<DUP`, `<INV`, `<CN`) take their
/// span from `END=` in INFO, falling back to `SVLEN=` (relative to start);
/// comma-separated values take the maximum. Anything else spans the
/// reference allele.
fn vcf_end(toks: &[&[u8]], start: i64, line_no: u64) -> Result<i64> {
    let ref_allele = trim_line_ending(column(toks, 3, line_no)?);
    let alt = trim_line_ending(column(toks, 4, line_no)?);

    let symbolic = memmem::find(alt, b"<").is_some()
        && (memmem::find(alt, b"<DEL").is_some()
            || memmem::find(alt, b"<DUP").is_some()
            || memmem::find(alt, b"<INV").is_some()
            || memmem::find(alt, b"<CN").is_some());
    if !symbolic {
        return Ok(start + ref_allele.len() as i64);
    }

    // with fewer than 8 columns the last token holds the rest of the line,
    // which is where END= would be anyway
    let info = if toks.len() < 8 {
        trim_line_ending(toks[toks.len() - 1])
    } else {
        trim_line_ending(toks[7])
    };

    if let Some(value) = info_value(info, b"END=") {
        return max_int(value, line_no);
    }
    if let Some(value) = info_value(info, b"SVLEN=") {
        return Ok(start + max_int(value, line_no)?);
    }

    eprintln!(
        "[gsort] warning: can't find end for {}",
        String::from_utf8_lossy(info)
    );
    Ok(start + ref_allele.len() as i64)
}

/// Find the value of `key` in an INFO field, terminated by `;` or the end.
fn info_value<'a>(info: &'a [u8], key: &[u8]) -> Option<&'a [u8]> {
    let pos = memmem::find(info, key)?;
    let value = &info[pos + key.len()..];
    let end = memchr::memchr(b';', value).unwrap_or(value.len());
    Some(&value[..end])
}

/// Parse an integer, or the maximum of a comma-separated list of integers.
fn max_int(value: &[u8], line_no: u64) -> Result<i64> {
    let mut best: Option<i64> = None;
    for part in value.split(|&b| b == b',') {
        let v = parse_int(part, "INFO", line_no)?;
        best = Some(best.map_or(v, |m| m.max(v)));
    }
    best.ok_or_else(|| SortError::Parse {
        line: line_no,
        message: "empty INFO value".to_string(),
    })
}

fn parse_int(tok: &[u8], what: &str, line_no: u64) -> Result<i64> {
    let tok = trim_line_ending(tok);
    std::str::from_utf8(tok)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| SortError::Parse {
            line: line_no,
            message: format!(
                "invalid {} field: '{}'",
                what,
                String::from_utf8_lossy(tok)
            ),
        })
}

fn column<'a>(toks: &[&'a [u8]], idx: usize, line_no: u64) -> Result<&'a [u8]> {
    toks.get(idx).copied().ok_or_else(|| SortError::Parse {
        line: line_no,
        message: format!("line has fewer than {} columns", idx + 1),
    })
}

/// Split on tabs into at most `limit` tokens; the final token keeps the
/// unsplit remainder of the line.
fn split_tabs(line: &[u8], limit: usize) -> Vec<&[u8]> {
    let mut toks = Vec::with_capacity(limit);
    let mut rest = line;
    while toks.len() + 1 < limit {
        match memchr::memchr(b'\t', rest) {
            Some(pos) => {
                toks.push(&rest[..pos]);
                rest = &rest[pos + 1..];
            }
            None => break,
        }
    }
    toks.push(rest);
    toks
}
