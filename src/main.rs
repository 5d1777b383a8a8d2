//! gsort: sort genomic interval files according to a genome file.
//!
//! Usage: gsort <COMMAND> [OPTIONS]

use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use gsort_genomics::cleanup;
use gsort_genomics::commands::{CheckCommand, SortCommand, DEFAULT_MEMORY_MB};
use gsort_genomics::error::Result;
use gsort_genomics::format;
use gsort_genomics::genome::Genome;
use gsort_genomics::input;

#[derive(Parser)]
#[command(name = "gsort")]
#[command(version)]
#[command(about = "sort genomic interval files (BED/VCF/GFF/GTF) by genome-file chromosome order", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sort a tab-delimited interval file to stdout
    Sort {
        /// Input file (use - for stdin; .gz is decompressed transparently)
        input: PathBuf,

        /// Genome file of chromosome sizes and order
        genome: PathBuf,

        /// Megabytes of memory to use before spilling to temp files
        #[arg(short = 'm', long, default_value_t = DEFAULT_MEMORY_MB)]
        memory: usize,

        /// Number of sort workers (default: number of CPUs)
        #[arg(short = 't', long)]
        threads: Option<usize>,

        /// Chromosome alias file (input-name <TAB> canonical-name)
        #[arg(long)]
        chrom_map: Option<PathBuf>,

        /// Print sorting statistics to stderr
        #[arg(long)]
        stats: bool,
    },

    /// Check that a BGZF-compressed, indexed file is sorted
    Check {
        /// File to check (.vcf.gz, .bed.gz, or GFF/GTF)
        input: PathBuf,

        /// Genome file of chromosome sizes and order
        #[arg(short = 'g', long)]
        genome: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Sort {
            input,
            genome,
            memory,
            threads,
            chrom_map,
            stats,
        } => run_sort(input, genome, memory, threads, chrom_map, stats),
        Commands::Check { input, genome } => run_check(input, genome),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run_sort(
    input: PathBuf,
    genome_path: PathBuf,
    memory: usize,
    threads: Option<usize>,
    chrom_map: Option<PathBuf>,
    stats: bool,
) -> Result<()> {
    cleanup::install_signal_cleanup(std::env::temp_dir());

    let genome = Arc::new(Genome::from_files(&genome_path, chrom_map.as_deref())?);
    let rdr = input::open(&input)?;
    let (fmt, rdr) = format::sniff(rdr)?;

    let mut cmd = SortCommand::new().memory_mb(memory);
    if let Some(t) = threads {
        cmd = cmd.threads(t);
    }

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let result = cmd.run(rdr, &mut handle, fmt, genome)?;
    handle.flush()?;

    if stats {
        eprintln!("Sort stats: {}", result);
    }
    Ok(())
}

fn run_check(input: PathBuf, genome_path: PathBuf) -> Result<()> {
    let genome = Genome::from_file(&genome_path)?;
    let stats = CheckCommand::new().run(&input, &genome)?;
    eprintln!(
        "ok: {} records in sorted order ({} header lines)",
        stats.records, stats.header_lines
    );
    Ok(())
}
