// Clippy allows for the whole crate
#![allow(clippy::too_many_arguments)]

//! gsort: genome-ordered sorting for genomic interval files
//!
//! This library sorts tab-delimited interval records (BED, VCF, GFF/GTF)
//! into the chromosome order declared by a genome file, spilling to
//! compressed temporary runs when the input exceeds the memory budget, and
//! checks that previously sorted, block-compressed files actually obey
//! that order.
//!
//! # Features
//!
//! - **External sorting**: memory-bounded chunks, parallel sort workers,
//!   k-way merge over compressed runs
//! - **Format detection**: BED / VCF / GFF / GTF sniffed from the stream
//!   prefix, headers preserved
//! - **Sort-order checking**: order, position and chromosome-bounds
//!   validation of BGZF files
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gsort_genomics::{commands::SortCommand, format, genome::Genome, input};
//!
//! let genome = Arc::new(Genome::from_file("hg19.genome").unwrap());
//! let rdr = input::open("intervals.bed").unwrap();
//! let (fmt, rdr) = format::sniff(rdr).unwrap();
//!
//! let stats = SortCommand::new()
//!     .memory_mb(500)
//!     .run(rdr, std::io::stdout().lock(), fmt, genome)
//!     .unwrap();
//! eprintln!("{}", stats);
//! ```

pub mod bgzf;
pub mod cleanup;
pub mod commands;
pub mod error;
pub mod format;
pub mod genome;
pub mod input;
pub mod key;

// Re-export commonly used types
pub use error::{Result, SortError};
pub use format::Format;
pub use genome::Genome;
pub use key::SortKey;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::commands::{CheckCommand, SortCommand};
    pub use crate::error::{Result, SortError};
    pub use crate::format::{sniff, Format};
    pub use crate::genome::Genome;
    pub use crate::key::{extract_key, SortKey};
}
