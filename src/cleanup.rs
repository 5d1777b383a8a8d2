//! Temporary spill-file hygiene.
//!
//! Spill files are named `gsort.<pid>.<chunk>.<rand>` so that everything
//! belonging to this process can be found again by prefix. On SIGINT,
//! SIGTERM or SIGQUIT the handler removes them and exits with status 3;
//! normal operation removes each run as the merge drains it.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

/// Prefix shared by every spill file of this process.
pub fn spill_prefix() -> String {
    format!("gsort.{}.", process::id())
}

/// Remove every file in `dir` whose name starts with `prefix`.
/// Returns the number of files removed; I/O errors are ignored.
pub(crate) fn remove_matching(dir: &Path, prefix: &str) -> usize {
    let mut removed = 0;
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(_) => return 0,
    };
    for entry in entries.flatten() {
        if entry.file_name().to_string_lossy().starts_with(prefix) && fs::remove_file(entry.path()).is_ok() {
            removed += 1;
        }
    }
    removed
}

/// Install a signal handler that removes this process's spill files from
/// `tmp_dir` and exits with status 3.
///
/// Call once at startup, before sorting begins.
#[cfg(unix)]
pub fn install_signal_cleanup(tmp_dir: PathBuf) {
    use signal_hook::consts::signal::{SIGINT, SIGQUIT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = match Signals::new([SIGINT, SIGTERM, SIGQUIT]) {
        Ok(signals) => signals,
        Err(e) => {
            eprintln!("[gsort] warning: unable to install signal handler: {}", e);
            return;
        }
    };

    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            remove_matching(&tmp_dir, &spill_prefix());
            process::exit(3);
        }
    });
}

#[cfg(not(unix))]
pub fn install_signal_cleanup(_tmp_dir: PathBuf) {}
