//! Genome file parser for chromosome order and sizes.
//!
//! A genome file is tab- or space-delimited text with at least two columns
//! per payload line: chromosome name and length. The order of appearance
//! defines the canonical chromosome order used for sorting and checking.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{Result, SortError};
use crate::input;

/// Chromosome order and sizes loaded from a genome file.
///
/// Each chromosome gets a dense rank (0-based, by order of appearance) and
/// a length. An optional alias table remaps input names to canonical names
/// before lookup. Immutable after construction.
#[derive(Debug, Clone, Default)]
pub struct Genome {
    lengths: HashMap<String, u64>,
    ranks: HashMap<String, u32>,
    aliases: Option<HashMap<String, String>>,
}

impl Genome {
    /// Load a genome file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_files(path, None::<&Path>)
    }

    /// Load a genome file plus an optional chromosome alias file.
    ///
    /// Lines starting with `#` and blank lines are skipped. Leading lines
    /// whose second field does not parse as a length are tolerated as a
    /// header; once a valid payload line has been seen, a bad length is a
    /// hard error.
    pub fn from_files<P: AsRef<Path>, Q: AsRef<Path>>(
        path: P,
        alias_path: Option<Q>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let aliases = match alias_path {
            Some(p) => Some(read_alias_file(p.as_ref())?),
            None => None,
        };

        let mut lengths = HashMap::new();
        let mut ranks = HashMap::new();
        let mut found = false;

        for (idx, line) in input::read_lines(path)?.enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut fields = line.split_whitespace();
            let chrom = fields.next().unwrap_or("");
            let length = match fields.next().map(str::parse::<u64>) {
                Some(Ok(n)) => n,
                _ if !found => continue, // header tolerance
                _ => {
                    return Err(SortError::Parse {
                        line: idx as u64 + 1,
                        message: format!("invalid chromosome length in genome file: {}", line),
                    });
                }
            };
            found = true;

            if !ranks.contains_key(chrom) {
                ranks.insert(chrom.to_string(), ranks.len() as u32);
            }
            lengths.insert(chrom.to_string(), length);
        }

        if !found {
            return Err(SortError::InputFormat(format!(
                "no usable chromosome lengths found in {}",
                path.display()
            )));
        }

        Ok(Self {
            lengths,
            ranks,
            aliases,
        })
    }

    /// Resolve an input name through the alias table, if any.
    fn resolve<'a>(&'a self, name: &'a str) -> &'a str {
        match &self.aliases {
            Some(map) => map.get(name).map(String::as_str).unwrap_or(name),
            None => name,
        }
    }

    /// Rank of a chromosome in genome-file order.
    #[inline]
    pub fn rank(&self, chrom: &str) -> Option<u32> {
        self.ranks.get(self.resolve(chrom)).copied()
    }

    /// Declared length of a chromosome.
    #[inline]
    pub fn length(&self, chrom: &str) -> Option<u64> {
        self.lengths.get(self.resolve(chrom)).copied()
    }

    /// Check if a chromosome exists.
    #[inline]
    pub fn has_chrom(&self, chrom: &str) -> bool {
        self.ranks.contains_key(self.resolve(chrom))
    }

    /// True iff `a` occurs at or before `b` in the genome order.
    ///
    /// The comparison is `<=`, not `<`: the sort-order checker relies on
    /// equal ranks passing when it walks adjacent records. Unknown names
    /// compare false. The sorter itself never calls this; it orders by the
    /// strict `Ord` on decorated keys.
    #[inline]
    pub fn less(&self, a: &str, b: &str) -> bool {
        match (self.rank(a), self.rank(b)) {
            (Some(ra), Some(rb)) => ra <= rb,
            _ => false,
        }
    }

    /// Number of chromosomes.
    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }
}

/// Read a chromosome alias file: tab-separated `input-name\tcanonical-name`.
///
/// Rows with a single column map to `"[unknown]" + name`; the first such row
/// triggers a one-time warning.
fn read_alias_file(path: &Path) -> Result<HashMap<String, String>> {
    let mut result = HashMap::new();
    let mut warned = false;

    for line in input::read_lines(path)? {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut toks = line.split('\t');
        let name = toks.next().unwrap_or("").to_string();
        let canonical = match toks.next() {
            Some(c) => c.to_string(),
            None => {
                if !warned {
                    eprintln!("[gsort] warning: unmappable chromosome: {}", name);
                    warned = true;
                }
                format!("[unknown]{}", name)
            }
        };
        result.insert(name, canonical);
    }

    Ok(result)
}
