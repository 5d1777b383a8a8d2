//! Transparent input opening.
//!
//! `-` means stdin; paths ending in `.gz` or `.bgz` are decompressed on the
//! fly. BGZF files are valid multi-member gzip streams, so the same decoder
//! covers both.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use flate2::read::MultiGzDecoder;

use crate::error::{Result, SortError};

const READ_BUF: usize = 64 * 1024;

/// Open a path for buffered reading, decompressing gzip transparently.
pub fn open<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufReader::with_capacity(READ_BUF, io::stdin())));
    }

    let file = File::open(path)?;
    let name = path.to_string_lossy();
    if name.ends_with(".gz") || name.ends_with(".bgz") {
        Ok(Box::new(BufReader::with_capacity(
            READ_BUF,
            MultiGzDecoder::new(file),
        )))
    } else {
        Ok(Box::new(BufReader::with_capacity(READ_BUF, file)))
    }
}

/// Iterate over the lines of a (possibly compressed) file.
pub fn read_lines<P: AsRef<Path>>(path: P) -> Result<impl Iterator<Item = Result<String>>> {
    let rdr = open(path)?;
    Ok(rdr.lines().map(|l| l.map_err(SortError::from)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::{Read, Write};
    use tempfile::NamedTempFile;

    #[test]
    fn test_open_plain() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"chr1\t1\t2\n").unwrap();
        file.flush().unwrap();

        let mut rdr = open(file.path()).unwrap();
        let mut s = String::new();
        rdr.read_to_string(&mut s).unwrap();
        assert_eq!(s, "chr1\t1\t2\n");
    }

    #[test]
    fn test_open_gzip() {
        let file = tempfile::Builder::new().suffix(".gz").tempfile().unwrap();
        let mut gz = GzEncoder::new(file.reopen().unwrap(), Compression::default());
        gz.write_all(b"chr1\t1\t2\nchr2\t3\t4\n").unwrap();
        gz.finish().unwrap();

        let lines: Vec<String> = read_lines(file.path())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(lines, vec!["chr1\t1\t2", "chr2\t3\t4"]);
    }
}
