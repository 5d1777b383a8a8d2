//! Sort-order checking for block-compressed interval files.
//!
//! Verifies that a BGZF-compressed, indexed file is ordered according to a
//! genome file: chromosomes in genome order, positions non-decreasing
//! within a chromosome, and every position within the declared chromosome
//! length. Header placement is validated per format.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::bgzf;
use crate::error::{Result, SortError};
use crate::genome::Genome;

const READ_BUF: usize = 64 * 1024;

/// Which column carries the record position.
#[derive(Debug, Clone, Copy)]
enum PositionColumn {
    /// Column 1: VCF POS (1-based) and BED start (0-based) alike.
    Second,
    /// Column 3: GFF/GTF start (1-based).
    Fourth,
}

impl PositionColumn {
    fn get(self, line: &[u8], line_no: u64) -> Result<(String, i64)> {
        let idx = match self {
            PositionColumn::Second => 1,
            PositionColumn::Fourth => 3,
        };
        let mut toks = line.splitn(idx + 2, |&b| b == b'\t');
        let chrom = toks.next().unwrap_or(b"");
        let pos = toks.nth(idx - 1).ok_or_else(|| SortError::Parse {
            line: line_no,
            message: format!("line has fewer than {} columns", idx + 1),
        })?;
        let pos = trim(pos);

        let chrom = String::from_utf8_lossy(chrom).into_owned();
        let pos: i64 = std::str::from_utf8(pos)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| SortError::Parse {
                line: line_no,
                message: format!("invalid position: '{}'", String::from_utf8_lossy(pos)),
            })?;
        Ok((chrom, pos))
    }
}

fn trim(tok: &[u8]) -> &[u8] {
    crate::format::trim_line_ending(tok)
}

/// Statistics from a check run.
#[derive(Debug, Default, Clone)]
pub struct CheckStats {
    pub records: u64,
    pub header_lines: u64,
}

/// Sort-order check command.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckCommand;

impl CheckCommand {
    pub fn new() -> Self {
        Self
    }

    /// Check one file against the genome order.
    ///
    /// The file must be BGZF with the EOF sentinel block and have a `.tbi`
    /// or `.csi` sidecar. The format is chosen by suffix: `.vcf.gz` runs
    /// the VCF header machine, `.bed.gz` and the GFF/GTF family run the
    /// tab machine.
    pub fn run<P: AsRef<Path>>(&self, path: P, genome: &Genome) -> Result<CheckStats> {
        let path = path.as_ref();
        let name = path.to_string_lossy();

        if name.ends_with(".vcf.gz") {
            self.check_vcf(path, genome)
        } else if name.ends_with(".bed.gz") {
            self.check_tab(path, genome, PositionColumn::Second)
        } else if is_gff_like(&name) {
            self.check_tab(path, genome, PositionColumn::Fourth)
        } else {
            Err(SortError::InputFormat(format!(
                "don't know how to check this type of file: {}",
                name
            )))
        }
    }

    fn open_checked(&self, path: &Path) -> Result<BufReader<MultiGzDecoder<File>>> {
        if !bgzf::has_index(path) {
            return Err(SortError::Integrity(format!(
                "{} should have a .tbi or .csi index",
                path.display()
            )));
        }
        if !bgzf::has_eof(path)? {
            return Err(SortError::Integrity(format!(
                "missing EOF block in {}",
                path.display()
            )));
        }
        let file = File::open(path)?;
        Ok(BufReader::with_capacity(READ_BUF, MultiGzDecoder::new(file)))
    }

    fn check_tab(&self, path: &Path, genome: &Genome, col: PositionColumn) -> Result<CheckStats> {
        let mut rdr = self.open_checked(path)?;
        let mut stats = CheckStats::default();
        let mut state = OrderState::new(genome);
        let mut line_no = 0u64;

        let mut line = Vec::new();
        loop {
            line.clear();
            if rdr.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            line_no += 1;

            if line[0] == b'#' || line.starts_with(b"track") || line.starts_with(b"browser") {
                if stats.records > 0 {
                    return Err(SortError::OrderViolation {
                        line: line_no,
                        message: "found comment/header line after records".to_string(),
                    });
                }
                stats.header_lines += 1;
            } else {
                let (chrom, pos) = col.get(&line, line_no)?;
                state.advance(&chrom, pos, line_no)?;
                stats.records += 1;
            }
        }

        Ok(stats)
    }

    fn check_vcf(&self, path: &Path, genome: &Genome) -> Result<CheckStats> {
        let mut rdr = self.open_checked(path)?;
        let mut stats = CheckStats::default();
        let mut state = OrderState::new(genome);
        let mut after_header = false;
        let mut line_no = 0u64;

        let mut line = Vec::new();
        loop {
            line.clear();
            if rdr.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            line_no += 1;

            if line_no == 1 && !line.starts_with(b"##fileformat=VCF") {
                return Err(SortError::InputFormat(
                    "VCF header line '##fileformat=VCF...' not found".to_string(),
                ));
            }
            if line[0] == b'#' {
                if line.starts_with(b"#CHROM\t") {
                    after_header = true;
                } else if after_header {
                    return Err(SortError::OrderViolation {
                        line: line_no,
                        message: "comment line after non-header #CHROM line in VCF".to_string(),
                    });
                }
                stats.header_lines += 1;
            } else {
                if !after_header {
                    return Err(SortError::InputFormat(
                        "VCF header line '#CHROM\t...' not found".to_string(),
                    ));
                }
                let (chrom, pos) = PositionColumn::Second.get(&line, line_no)?;
                state.advance(&chrom, pos, line_no)?;
                stats.records += 1;
            }
        }

        Ok(stats)
    }
}

fn is_gff_like(name: &str) -> bool {
    ["gff", "gtf", "gff3", "gff2"]
        .iter()
        .any(|suff| name.ends_with(suff) || name.ends_with(&format!("{}.gz", suff)))
}

/// Incremental order/bounds state over a stream of records.
struct OrderState<'a> {
    genome: &'a Genome,
    last_chrom: Option<String>,
    last_pos: i64,
}

impl<'a> OrderState<'a> {
    fn new(genome: &'a Genome) -> Self {
        Self {
            genome,
            last_chrom: None,
            last_pos: -1,
        }
    }

    fn advance(&mut self, chrom: &str, pos: i64, line_no: u64) -> Result<()> {
        if !self.genome.has_chrom(chrom) {
            return Err(SortError::UnknownSequence {
                name: chrom.to_string(),
            });
        }

        match self.last_chrom.as_deref() {
            Some(last) if last != chrom => {
                // adjacency uses the <= comparator: equal ranks cannot
                // occur here, distinct names have distinct ranks
                if !self.genome.less(last, chrom) {
                    return Err(SortError::OrderViolation {
                        line: line_no,
                        message: format!(
                            "chromosomes not in specified sort order: {}, {}",
                            last, chrom
                        ),
                    });
                }
                self.last_chrom = Some(chrom.to_string());
                self.last_pos = pos;
            }
            Some(_) => {
                if pos < self.last_pos {
                    return Err(SortError::OrderViolation {
                        line: line_no,
                        message: format!("positions not sorted: {} => {}", self.last_pos, pos),
                    });
                }
                self.last_pos = pos;
            }
            None => {
                self.last_chrom = Some(chrom.to_string());
                self.last_pos = pos;
            }
        }

        if pos < 0 {
            return Err(SortError::OrderViolation {
                line: line_no,
                message: format!("negative position: {}", pos),
            });
        }
        let length = self.genome.length(chrom).unwrap_or(0);
        if pos as u64 > length {
            return Err(SortError::BoundsViolation {
                line: line_no,
                message: format!("position: {} beyond end of chromosome {}", pos, chrom),
            });
        }

        Ok(())
    }
}
