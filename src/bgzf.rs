//! BGZF capabilities consumed by the sort-order checker.
//!
//! Only two questions are answered here: does a file end with the BGZF EOF
//! sentinel block, and does it have a tabix/CSI index sidecar. Decompression
//! of the blocks themselves goes through the regular multi-member gzip
//! decoder; the block format is not re-implemented.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// The 28-byte empty BGZF block that terminates a well-formed file.
pub const BGZF_EOF: [u8; 28] = [
    0x1f, 0x8b, 0x08, 0x04, 0x00, 0x00, 0x00, 0x00, 0x00, 0xff, 0x06, 0x00, 0x42, 0x43, 0x02,
    0x00, 0x1b, 0x00, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Check whether a file ends with the BGZF EOF sentinel block.
pub fn has_eof<P: AsRef<Path>>(path: P) -> io::Result<bool> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    if len < BGZF_EOF.len() as u64 {
        return Ok(false);
    }
    file.seek(SeekFrom::End(-(BGZF_EOF.len() as i64)))?;
    let mut tail = [0u8; 28];
    file.read_exact(&mut tail)?;
    Ok(tail == BGZF_EOF)
}

/// Check whether a `.tbi` or `.csi` index sidecar exists next to the file.
pub fn has_index<P: AsRef<Path>>(path: P) -> bool {
    let path = path.as_ref();
    sidecar(path, "tbi").exists() || sidecar(path, "csi").exists()
}

fn sidecar(path: &Path, ext: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}
