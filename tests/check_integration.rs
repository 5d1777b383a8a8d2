//! Integration tests for the sort-order checker, including agreement with
//! the sorter: anything the sorter emits should pass the check once it is
//! wrapped in a block-gzip container with an index sidecar.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use flate2::write::GzEncoder;
use flate2::Compression;
use gsort_genomics::bgzf::BGZF_EOF;
use gsort_genomics::commands::{CheckCommand, SortCommand};
use gsort_genomics::format::{self, Format};
use gsort_genomics::genome::Genome;
use tempfile::{NamedTempFile, TempDir};

fn test_genome() -> Arc<Genome> {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "chr1\t1000\nchr2\t500\n").unwrap();
    file.flush().unwrap();
    Arc::new(Genome::from_file(file.path()).unwrap())
}

/// Wrap `content` as gzip + BGZF EOF sentinel and create a `.tbi` sidecar.
fn bgzf_fixture(dir: &TempDir, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    let mut file = File::create(&path).unwrap();
    let mut gz = GzEncoder::new(&mut file, Compression::default());
    gz.write_all(content).unwrap();
    gz.finish().unwrap();
    file.write_all(&BGZF_EOF).unwrap();
    drop(file);
    File::create(dir.path().join(format!("{}.tbi", name))).unwrap();
    path
}

#[test]
fn test_sort_then_check_bed() {
    let genome = test_genome();
    let dir = tempfile::tempdir().unwrap();

    let input: &[u8] =
        b"chr2\t10\t20\nchr1\t5\t8\nchr1\t1\t4\nchr2\t499\t500\nchr1\t999\t1000\n";
    let (fmt, rdr) = format::sniff(input).unwrap();
    assert_eq!(fmt, Format::Bed);

    let mut sorted = Vec::new();
    SortCommand::new()
        .threads(2)
        .run(rdr, &mut sorted, fmt, Arc::clone(&genome))
        .unwrap();

    let path = bgzf_fixture(&dir, "sorted.bed.gz", &sorted);
    let stats = CheckCommand::new().run(&path, &genome).unwrap();
    assert_eq!(stats.records, 5);
}

#[test]
fn test_sort_then_check_vcf() {
    let genome = test_genome();
    let dir = tempfile::tempdir().unwrap();

    let input: &[u8] = b"##fileformat=VCFv4.2\n\
        #CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\n\
        chr2\t400\t.\tG\tC\t.\t.\t.\n\
        chr1\t100\t.\tA\t<DEL>\t.\t.\tEND=200\n\
        chr1\t50\t.\tA\tT\t.\t.\t.\n";
    let (fmt, rdr) = format::sniff(input).unwrap();
    assert_eq!(fmt, Format::Vcf);

    let mut sorted = Vec::new();
    SortCommand::new()
        .threads(1)
        .run(rdr, &mut sorted, fmt, Arc::clone(&genome))
        .unwrap();

    let path = bgzf_fixture(&dir, "sorted.vcf.gz", &sorted);
    let stats = CheckCommand::new().run(&path, &genome).unwrap();
    assert_eq!(stats.records, 3);
    assert_eq!(stats.header_lines, 2);
}

#[test]
fn test_check_rejects_unsorted() {
    let genome = test_genome();
    let dir = tempfile::tempdir().unwrap();

    let path = bgzf_fixture(&dir, "x.bed.gz", b"chr2\t10\t20\nchr1\t1\t4\n");
    let err = CheckCommand::new().run(&path, &genome).unwrap_err();
    assert!(err
        .to_string()
        .contains("chromosomes not in specified sort order"));
}

#[test]
fn test_check_rejects_out_of_bounds() {
    let genome = test_genome();
    let dir = tempfile::tempdir().unwrap();

    let path = bgzf_fixture(&dir, "x.bed.gz", b"chr2\t600\t601\n");
    let err = CheckCommand::new().run(&path, &genome).unwrap_err();
    assert!(err.to_string().contains("beyond end of chromosome"));
}
