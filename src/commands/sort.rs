//! External sort command implementation.
//!
//! The input stream is split into memory-bounded chunks. Each chunk is
//! decorated with sort keys, sorted, and spilled as a gzip-compressed run
//! file by a bounded pool of workers; the runs are then k-way merged
//! through a min-heap into the output. A single run skips the heap and is
//! streamed back out directly.
//!
//! Sort order:
//! 1. Primary: chromosome, in genome-file order
//! 2. Secondary: start coordinate (ascending, numeric)
//! 3. Tertiary: end coordinate (ascending, numeric; inferred for VCF)
//! 4. Ties: unspecified (unstable)

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::cleanup::spill_prefix;
use crate::error::{Result, SortError};
use crate::format::Format;
use crate::genome::Genome;
use crate::key::{extract_key, SortKey};

/// Default memory budget in megabytes.
pub const DEFAULT_MEMORY_MB: usize = 2000;

/// Buffer size for spill writing and merge reading.
const SPILL_BUF: usize = 64 * 1024;

type SpillResult = std::result::Result<(usize, PathBuf), SortError>;

/// External sort command configuration.
#[derive(Debug, Clone)]
pub struct SortCommand {
    memory_mb: usize,
    threads: usize,
    tmp_dir: PathBuf,
}

/// Statistics from a sort operation.
#[derive(Debug, Default, Clone)]
pub struct SortStats {
    /// Record lines read (excluding the header).
    pub records: u64,
    /// Header lines passed through.
    pub header_lines: u64,
    /// Sorted runs spilled to temporary storage.
    pub chunks: usize,
}

impl std::fmt::Display for SortStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Records: {}, Header lines: {}, Chunks: {}",
            self.records, self.header_lines, self.chunks
        )
    }
}

impl Default for SortCommand {
    fn default() -> Self {
        Self::new()
    }
}

impl SortCommand {
    pub fn new() -> Self {
        Self {
            memory_mb: DEFAULT_MEMORY_MB,
            threads: std::thread::available_parallelism().map_or(1, |n| n.get()),
            tmp_dir: std::env::temp_dir(),
        }
    }

    /// Set the memory budget in megabytes, shared across all workers.
    pub fn memory_mb(mut self, memory_mb: usize) -> Self {
        self.memory_mb = memory_mb;
        self
    }

    /// Set the number of chunk-sort workers.
    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    /// Set the directory for spill files.
    pub fn tmp_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.tmp_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Sort `rdr` into `wtr`.
    ///
    /// Leading `#` lines are passed through verbatim before any record.
    /// Records are emitted in ascending `(chromosome rank, start, end)`
    /// order; ties come out in an unspecified order.
    pub fn run<R: BufRead, W: Write>(
        &self,
        mut rdr: R,
        wtr: W,
        format: Format,
        genome: Arc<Genome>,
    ) -> Result<SortStats> {
        let mut wtr = BufWriter::with_capacity(SPILL_BUF, wtr);
        let header_lines = copy_header(&mut rdr, &mut wtr)?;
        let mut stats = SortStats {
            header_lines,
            ..SortStats::default()
        };

        let runs = self.write_runs(&mut rdr, format, &genome, &mut stats)?;
        let mut spills = SpillSet::new(runs);

        match spills.len() {
            0 => {} // header-only input
            1 => write_one(&mut spills, &mut wtr)?,
            _ => merge(&mut spills, &mut wtr, format, &genome)?,
        }

        wtr.flush()?;
        Ok(stats)
    }

    /// Read memory-bounded chunks and fan them out to sort-and-spill
    /// workers. Returns the run files in chunk order.
    fn write_runs<R: BufRead>(
        &self,
        rdr: &mut R,
        format: Format,
        genome: &Arc<Genome>,
        stats: &mut SortStats,
    ) -> Result<Vec<PathBuf>> {
        let budget = (1_000_000usize.saturating_mul(self.memory_mb) / self.threads).max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| SortError::Io(io::Error::new(io::ErrorKind::Other, e.to_string())))?;

        // the token channel is the worker-pool semaphore: a chunk may only
        // be dispatched after taking a token, and workers return theirs on
        // completion, so a saturated pool blocks further reading
        let (token_tx, token_rx) = bounded::<()>(self.threads);
        for _ in 0..self.threads {
            let _ = token_tx.send(());
        }
        // results are tiny (a path each); an unbounded channel keeps a
        // finishing worker from blocking while it still holds its token
        let (done_tx, done_rx) = unbounded::<SpillResult>();

        let mut dispatched = 0usize;
        let mut line_no = stats.header_lines;

        let read_result = (|| -> Result<()> {
            let mut lines: Vec<Vec<u8>> = Vec::with_capacity(500);
            let mut chunk_base = 0u64;
            let mut sum = 0usize;

            loop {
                let mut line = Vec::new();
                if rdr.read_until(b'\n', &mut line)? == 0 {
                    break;
                }
                line_no += 1;
                // a line without a trailing newline is the last one in the
                // input; normalize it so every spilled record ends in '\n'
                let at_eof = line.last() != Some(&b'\n');
                if at_eof {
                    line.push(b'\n');
                }

                if lines.is_empty() {
                    chunk_base = line_no;
                }
                sum += line.len();
                lines.push(line);

                if at_eof {
                    break;
                }
                if sum >= budget {
                    self.spawn_chunk(
                        &pool,
                        std::mem::take(&mut lines),
                        chunk_base,
                        dispatched,
                        format,
                        genome,
                        (&token_rx, &token_tx, &done_tx),
                    )?;
                    dispatched += 1;
                    sum = 0;
                }
            }

            if !lines.is_empty() {
                self.spawn_chunk(
                    &pool,
                    lines,
                    chunk_base,
                    dispatched,
                    format,
                    genome,
                    (&token_rx, &token_tx, &done_tx),
                )?;
                dispatched += 1;
            }
            Ok(())
        })();

        // wait for every dispatched worker, keeping the first error
        let mut first_err = read_result.err();
        let mut runs: Vec<Option<PathBuf>> = vec![None; dispatched];
        for _ in 0..dispatched {
            match done_rx.recv() {
                Ok(Ok((idx, path))) => runs[idx] = Some(path),
                Ok(Err(e)) => {
                    if first_err.is_none() {
                        first_err = Some(e);
                    }
                }
                Err(_) => break,
            }
        }

        if let Some(e) = first_err {
            for path in runs.into_iter().flatten() {
                let _ = fs::remove_file(path);
            }
            return Err(e);
        }

        stats.records = line_no - stats.header_lines;
        stats.chunks = dispatched;
        Ok(runs.into_iter().flatten().collect())
    }

    #[allow(clippy::too_many_arguments)]
    fn spawn_chunk(
        &self,
        pool: &rayon::ThreadPool,
        chunk: Vec<Vec<u8>>,
        base_line: u64,
        idx: usize,
        format: Format,
        genome: &Arc<Genome>,
        (token_rx, token_tx, done_tx): (&Receiver<()>, &Sender<()>, &Sender<SpillResult>),
    ) -> Result<()> {
        token_rx.recv().map_err(|_| {
            SortError::Io(io::Error::new(
                io::ErrorKind::Other,
                "worker pool disconnected",
            ))
        })?;

        let genome = Arc::clone(genome);
        let tmp_dir = self.tmp_dir.clone();
        let done_tx = done_tx.clone();
        let token_tx = token_tx.clone();
        pool.spawn(move || {
            let result = sort_and_spill(chunk, base_line, idx, format, &genome, &tmp_dir);
            let _ = done_tx.send(result.map(|path| (idx, path)));
            let _ = token_tx.send(());
        });
        Ok(())
    }
}

/// Pass leading `#` lines through verbatim. Returns the number of header
/// lines copied.
fn copy_header<R: BufRead, W: Write>(rdr: &mut R, wtr: &mut W) -> Result<u64> {
    let mut count = 0;
    loop {
        let buf = rdr.fill_buf()?;
        if buf.is_empty() || buf[0] != b'#' {
            return Ok(count);
        }
        let mut line = Vec::new();
        rdr.read_until(b'\n', &mut line)?;
        wtr.write_all(&line)?;
        count += 1;
    }
}

/// Decorate, sort and spill one chunk. Runs on a worker thread.
fn sort_and_spill(
    chunk: Vec<Vec<u8>>,
    base_line: u64,
    idx: usize,
    format: Format,
    genome: &Genome,
    tmp_dir: &Path,
) -> std::result::Result<PathBuf, SortError> {
    let mut decorated: Vec<(SortKey, Vec<u8>)> = Vec::with_capacity(chunk.len());
    for (i, line) in chunk.into_iter().enumerate() {
        let key = extract_key(&line, format, genome, base_line + i as u64)?;
        decorated.push((key, line));
    }
    decorated.sort_unstable_by(|a, b| a.0.cmp(&b.0));

    let tmp = tempfile::Builder::new()
        .prefix(&format!("{}{}.", spill_prefix(), idx))
        .tempfile_in(tmp_dir)?;
    let (file, path) = tmp.keep().map_err(|e| SortError::Io(e.error))?;

    let write_result = (|| -> Result<()> {
        let gz = GzEncoder::new(file, Compression::fast());
        let mut wtr = BufWriter::with_capacity(SPILL_BUF, gz);
        for (_, line) in &decorated {
            wtr.write_all(line)?;
        }
        let gz = wtr
            .into_inner()
            .map_err(|e| SortError::Io(e.into_error()))?;
        gz.finish()?;
        Ok(())
    })();

    match write_result {
        Ok(()) => Ok(path),
        Err(e) => {
            let _ = fs::remove_file(&path);
            Err(e)
        }
    }
}

/// Run files owned by the merge phase. Files are removed as soon as they
/// are drained; anything left over (error paths) goes on drop.
struct SpillSet {
    paths: Vec<PathBuf>,
    removed: Vec<bool>,
}

impl SpillSet {
    fn new(paths: Vec<PathBuf>) -> Self {
        let removed = vec![false; paths.len()];
        Self { paths, removed }
    }

    fn len(&self) -> usize {
        self.paths.len()
    }

    fn remove(&mut self, idx: usize) {
        if !self.removed[idx] {
            let _ = fs::remove_file(&self.paths[idx]);
            self.removed[idx] = true;
        }
    }
}

impl Drop for SpillSet {
    fn drop(&mut self) {
        for idx in 0..self.paths.len() {
            self.remove(idx);
        }
    }
}

/// Fast path for a single run: the chunk is already sorted, so stream it
/// back out without the heap.
fn write_one<W: Write>(spills: &mut SpillSet, wtr: &mut W) -> Result<()> {
    let file = File::open(&spills.paths[0])?;
    let mut gz = GzDecoder::new(file);
    io::copy(&mut gz, wtr)?;
    spills.remove(0);
    Ok(())
}

/// One run's head in the merge heap.
struct MergeHead {
    key: SortKey,
    run: usize,
    line: Vec<u8>,
}

impl PartialEq for MergeHead {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.run == other.run
    }
}

impl Eq for MergeHead {}

impl PartialOrd for MergeHead {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeHead {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key
            .cmp(&other.key)
            .then_with(|| self.run.cmp(&other.run))
    }
}

/// K-way merge of sorted runs into the output.
///
/// Each still-nonempty run has exactly one head in the heap; a drained
/// run's file is removed immediately to reclaim temp space early.
fn merge<W: Write>(
    spills: &mut SpillSet,
    wtr: &mut W,
    format: Format,
    genome: &Genome,
) -> Result<()> {
    let mut readers: Vec<BufReader<GzDecoder<File>>> = Vec::with_capacity(spills.len());
    for path in &spills.paths {
        let file = File::open(path)?;
        readers.push(BufReader::with_capacity(SPILL_BUF, GzDecoder::new(file)));
    }

    let mut heap: BinaryHeap<Reverse<MergeHead>> = BinaryHeap::with_capacity(readers.len());
    for (run, rdr) in readers.iter_mut().enumerate() {
        let mut line = Vec::new();
        rdr.read_until(b'\n', &mut line)?;
        if line.is_empty() {
            spills.remove(run);
        } else {
            let key = extract_key(&line, format, genome, 0)?;
            heap.push(Reverse(MergeHead { key, run, line }));
        }
    }

    while let Some(Reverse(head)) = heap.pop() {
        // refill from the same run before writing the popped line
        let mut next = Vec::new();
        readers[head.run].read_until(b'\n', &mut next)?;
        if next.is_empty() {
            spills.remove(head.run);
        } else {
            let key = extract_key(&next, format, genome, 0)?;
            heap.push(Reverse(MergeHead {
                key,
                run: head.run,
                line: next,
            }));
        }
        wtr.write_all(&head.line)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn test_genome() -> Arc<Genome> {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "chr1\t1000\nchr2\t500\n").unwrap();
        file.flush().unwrap();
        Arc::new(Genome::from_file(file.path()).unwrap())
    }

    fn sort_bytes(cmd: &SortCommand, input: &[u8], format: Format) -> (Vec<u8>, SortStats) {
        let genome = test_genome();
        let mut output = Vec::new();
        let stats = cmd.run(input, &mut output, format, genome).unwrap();
        (output, stats)
    }

    #[test]
    fn test_bed_reorder() {
        let cmd = SortCommand::new().threads(2);
        let input = b"chr2\t10\t20\nchr1\t5\t8\nchr1\t1\t4\n";
        let (output, stats) = sort_bytes(&cmd, input, Format::Bed);

        assert_eq!(output, b"chr1\t1\t4\nchr1\t5\t8\nchr2\t10\t20\n");
        assert_eq!(stats.records, 3);
        assert_eq!(stats.chunks, 1);
    }

    #[test]
    fn test_header_preserved_vcf_symbolic_end() {
        let cmd = SortCommand::new().threads(1);
        let input = b"##fileformat=VCFv4.2\n\
                      #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
                      chr1\t100\t.\tA\t<DEL>\t.\t.\tEND=200\n\
                      chr1\t50\t.\tA\tT\t.\t.\t.\n";
        let (output, stats) = sort_bytes(&cmd, input, Format::Vcf);

        let expected = b"##fileformat=VCFv4.2\n\
                         #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
                         chr1\t50\t.\tA\tT\t.\t.\t.\n\
                         chr1\t100\t.\tA\t<DEL>\t.\t.\tEND=200\n";
        assert_eq!(output, expected);
        assert_eq!(stats.header_lines, 2);
        assert_eq!(stats.records, 2);
    }

    #[test]
    fn test_unknown_chromosome_fails() {
        let cmd = SortCommand::new().threads(1);
        let genome = test_genome();
        let input: &[u8] = b"chr1\t1\t2\nchrZ\t1\t2\n";
        let mut output = Vec::new();
        let err = cmd
            .run(input, &mut output, Format::Bed, genome)
            .unwrap_err();
        match err {
            SortError::UnknownSequence { name } => assert_eq!(name, "chrZ"),
            other => panic!("expected UnknownSequence, got {}", other),
        }
    }

    #[test]
    fn test_missing_trailing_newline_appended() {
        let cmd = SortCommand::new().threads(1);
        let input = b"chr2\t10\t20\nchr1\t5\t8";
        let (output, _) = sort_bytes(&cmd, input, Format::Bed);
        assert_eq!(output, b"chr1\t5\t8\nchr2\t10\t20\n");
    }

    #[test]
    fn test_header_only_input() {
        let cmd = SortCommand::new().threads(1);
        let genome = test_genome();
        let input: &[u8] = b"# just a header\n";
        let mut output = Vec::new();
        let stats = cmd.run(input, &mut output, Format::Bed, genome).unwrap();
        assert_eq!(output, b"# just a header\n");
        assert_eq!(stats.records, 0);
        assert_eq!(stats.chunks, 0);
    }

    #[test]
    fn test_multi_chunk_merge() {
        let dir = tempfile::tempdir().unwrap();
        // memory budget of 0 forces one chunk per record
        let cmd = SortCommand::new()
            .memory_mb(0)
            .threads(2)
            .tmp_dir(dir.path());
        let genome = test_genome();

        let input: &[u8] = b"chr2\t10\t20\nchr1\t5\t8\nchr1\t1\t4\nchr2\t1\t2\n";
        let mut output = Vec::new();
        let stats = cmd.run(input, &mut output, Format::Bed, genome).unwrap();

        assert_eq!(
            output,
            b"chr1\t1\t4\nchr1\t5\t8\nchr2\t1\t2\nchr2\t10\t20\n"
        );
        assert_eq!(stats.chunks, 4);
        // every run file was drained and removed
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_error_cleans_spills() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = SortCommand::new()
            .memory_mb(0)
            .threads(2)
            .tmp_dir(dir.path());
        let genome = test_genome();

        let input: &[u8] = b"chr1\t1\t4\nchr2\t10\t20\nchrBAD\t1\t2\nchr1\t5\t8\n";
        let mut output = Vec::new();
        let err = cmd.run(input, &mut output, Format::Bed, genome).unwrap_err();
        assert!(err.to_string().contains("chrBAD"));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_idempotent_on_sorted_input() {
        let cmd = SortCommand::new().threads(1);
        let input = b"chr1\t1\t4\nchr1\t5\t8\nchr2\t10\t20\n";
        let (once, _) = sort_bytes(&cmd, input, Format::Bed);
        let (twice, _) = sort_bytes(&cmd, &once, Format::Bed);
        assert_eq!(once, twice);
        assert_eq!(once, input.to_vec());
    }

    #[test]
    fn test_end_is_tiebreaker() {
        let cmd = SortCommand::new().threads(1);
        let input = b"chr1\t100\t500\nchr1\t100\t200\nchr1\t100\t300\n";
        let (output, _) = sort_bytes(&cmd, input, Format::Bed);
        assert_eq!(output, b"chr1\t100\t200\nchr1\t100\t300\nchr1\t100\t500\n");
    }

    #[test]
    fn test_copy_header_stops_at_record() {
        let mut input: &[u8] = b"#h1\n#h2\nchr1\t1\t2\n";
        let mut out = Vec::new();
        let n = copy_header(&mut input, &mut out).unwrap();
        assert_eq!(n, 2);
        assert_eq!(out, b"#h1\n#h2\n");
        assert_eq!(input, b"chr1\t1\t2\n");
    }
}
