//! End-to-end tests for the dump-to-Parquet pipeline.
//!
//! Each test drives the public conversion entry points over small XML
//! fixtures (plain or bzip2-compressed, via temp files) and reads the
//! produced Parquet back with the Arrow record-batch reader to validate
//! row contents, ordering, and file fan-out.

use arrow::array::{Array, BooleanArray, StringArray, TimestampMillisecondArray, UInt64Array};
use arrow::record_batch::RecordBatch;
use bzip2::write::BzEncoder;
use bzip2::Compression;
use mediawiki2parquet::convert::{convert_all, convert_file, derive_targets, FileType, Job};
use mediawiki2parquet::writer::WriterOptions;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A one-page, one-revision dump matching the smallest real export shape.
fn single_revision_xml() -> &'static str {
    r#"<mediawiki><page><title>A</title><ns>0</ns><id>1</id>
<revision><id>10</id><timestamp>2024-01-15T09:30:00Z</timestamp>
<contributor><username>u</username><id>5</id></contributor>
<model>wikitext</model><format>text/x-wiki</format>
<text bytes="5">hello</text><sha1>abc</sha1></revision></page></mediawiki>"#
}

fn write_xml(dir: &Path, name: &str, xml: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, xml).unwrap();
    path
}

fn write_bz2(dir: &Path, name: &str, xml: &str) -> PathBuf {
    let mut encoder = BzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(xml.as_bytes()).unwrap();
    let path = dir.join(name);
    fs::write(&path, encoder.finish().unwrap()).unwrap();
    path
}

fn read_batches(path: &Path) -> Vec<RecordBatch> {
    let file = File::open(path).unwrap();
    ParquetRecordBatchReaderBuilder::try_new(file)
        .unwrap()
        .build()
        .unwrap()
        .map(|batch| batch.unwrap())
        .collect()
}

fn total_rows(path: &Path) -> usize {
    read_batches(path).iter().map(|b| b.num_rows()).sum()
}

fn string_col(batch: &RecordBatch, index: usize) -> &StringArray {
    batch.column(index).as_any().downcast_ref().unwrap()
}

fn u64_col(batch: &RecordBatch, index: usize) -> &UInt64Array {
    batch.column(index).as_any().downcast_ref().unwrap()
}

// ---------------------------------------------------------------------------
// Single-partition scenarios
// ---------------------------------------------------------------------------

#[test]
fn single_revision_produces_expected_row() {
    let dir = TempDir::new().unwrap();
    let src = write_xml(dir.path(), "dump.xml", single_revision_xml());
    let dst = dir.path().join("out.parquet");

    let (pages, rows) =
        convert_file(&src, &dst, None, &WriterOptions::default()).unwrap();
    assert_eq!(pages, 1);
    assert_eq!(rows, 1);

    let batches = read_batches(&dst);
    let batch = &batches[0];
    assert_eq!(batch.num_rows(), 1);
    assert_eq!(batch.num_columns(), 17);

    assert_eq!(string_col(batch, 0).value(0), "A");
    assert_eq!(u64_col(batch, 1).value(0), 0);
    assert_eq!(u64_col(batch, 2).value(0), 1);
    assert!(batch.column(3).is_null(0)); // redirect
    assert!(batch.column(4).is_null(0)); // restrictions
    assert_eq!(u64_col(batch, 5).value(0), 10);
    assert!(batch.column(6).is_null(0)); // rev_parent_id

    let timestamps: &TimestampMillisecondArray = batch.column(7).as_any().downcast_ref().unwrap();
    assert_eq!(timestamps.value(0), 1_705_311_000_000);

    assert_eq!(string_col(batch, 8).value(0), "u");
    assert_eq!(u64_col(batch, 9).value(0), 5);
    assert!(batch.column(10).is_null(0)); // rev_contrib_ip

    let minors: &BooleanArray = batch.column(11).as_any().downcast_ref().unwrap();
    assert!(!minors.value(0));

    assert!(batch.column(12).is_null(0)); // rev_comment
    assert_eq!(string_col(batch, 13).value(0), "wikitext");
    assert_eq!(string_col(batch, 14).value(0), "text/x-wiki");
    assert_eq!(string_col(batch, 15).value(0), "hello");
    assert_eq!(string_col(batch, 16).value(0), "abc");
}

#[test]
fn minor_element_sets_flag() {
    let xml = r#"<mediawiki><page><title>A</title><ns>0</ns><id>1</id>
<revision><id>10</id><timestamp>2024-01-15T09:30:00Z</timestamp>
<contributor><username>u</username><id>5</id></contributor>
<minor/><comment>c</comment>
<model>wikitext</model><format>text/x-wiki</format>
<text>hello</text><sha1>abc</sha1></revision></page></mediawiki>"#;

    let dir = TempDir::new().unwrap();
    let src = write_xml(dir.path(), "dump.xml", xml);
    let dst = dir.path().join("out.parquet");
    convert_file(&src, &dst, None, &WriterOptions::default()).unwrap();

    let batches = read_batches(&dst);
    let minors: &BooleanArray = batches[0].column(11).as_any().downcast_ref().unwrap();
    assert!(minors.value(0));
    assert_eq!(string_col(&batches[0], 12).value(0), "c");
}

#[test]
fn deleted_contributor_leaves_identity_columns_null() {
    let xml = r#"<mediawiki><page><title>A</title><ns>0</ns><id>1</id>
<revision><id>10</id><timestamp>2024-01-15T09:30:00Z</timestamp>
<contributor deleted="deleted"/>
<model>wikitext</model><format>text/x-wiki</format>
<text>hello</text><sha1>abc</sha1></revision></page></mediawiki>"#;

    let dir = TempDir::new().unwrap();
    let src = write_xml(dir.path(), "dump.xml", xml);
    let dst = dir.path().join("out.parquet");
    convert_file(&src, &dst, None, &WriterOptions::default()).unwrap();

    let batches = read_batches(&dst);
    let batch = &batches[0];
    assert_eq!(batch.num_rows(), 1);
    assert!(batch.column(8).is_null(0)); // username
    assert!(batch.column(9).is_null(0)); // contributor id
    assert!(batch.column(10).is_null(0)); // ip
}

#[test]
fn two_pages_yield_rows_in_document_order() {
    let xml = r#"<mediawiki>
<page><title>A</title><ns>0</ns><id>1</id>
<revision><id>10</id><timestamp>2024-01-15T09:30:00Z</timestamp>
<contributor><id>5</id></contributor>
<model>wikitext</model><format>text/x-wiki</format>
<text>a</text><sha1>aaa</sha1></revision></page>
<page><title>B</title><ns>0</ns><id>2</id>
<revision><id>20</id><timestamp>2024-01-16T09:30:00Z</timestamp>
<contributor><id>5</id></contributor>
<model>wikitext</model><format>text/x-wiki</format>
<text>b</text><sha1>bbb</sha1></revision></page>
</mediawiki>"#;

    let dir = TempDir::new().unwrap();
    let src = write_xml(dir.path(), "dump.xml", xml);
    let dst = dir.path().join("out.parquet");

    let (pages, rows) = convert_file(&src, &dst, None, &WriterOptions::default()).unwrap();
    assert_eq!(pages, 2);
    assert_eq!(rows, 2);

    let batches = read_batches(&dst);
    let titles: Vec<String> = batches
        .iter()
        .flat_map(|batch| {
            let col = string_col(batch, 0);
            (0..batch.num_rows()).map(|row| col.value(row).to_string()).collect::<Vec<_>>()
        })
        .collect();
    assert_eq!(titles, vec!["A", "B"]);
}

#[test]
fn revision_rows_follow_page_then_revision_order() {
    let xml = r#"<mediawiki>
<page><title>A</title><ns>0</ns><id>1</id>
<revision><id>10</id><timestamp>2024-01-15T09:30:00Z</timestamp>
<contributor><id>5</id></contributor>
<model>wikitext</model><format>text/x-wiki</format>
<text>a1</text><sha1>a</sha1></revision>
<revision><id>11</id><parentid>10</parentid><timestamp>2024-01-16T09:30:00Z</timestamp>
<contributor><id>5</id></contributor>
<model>wikitext</model><format>text/x-wiki</format>
<text>a2</text><sha1>b</sha1></revision></page>
<page><title>B</title><ns>0</ns><id>2</id>
<revision><id>20</id><timestamp>2024-01-17T09:30:00Z</timestamp>
<contributor><id>5</id></contributor>
<model>wikitext</model><format>text/x-wiki</format>
<text>b1</text><sha1>c</sha1></revision></page>
</mediawiki>"#;

    let dir = TempDir::new().unwrap();
    let src = write_xml(dir.path(), "dump.xml", xml);
    let dst = dir.path().join("out.parquet");

    let (pages, rows) = convert_file(&src, &dst, None, &WriterOptions::default()).unwrap();
    assert_eq!(pages, 2);
    assert_eq!(rows, 3);

    let batches = read_batches(&dst);
    let mut rev_ids = Vec::new();
    for batch in &batches {
        let col = u64_col(batch, 5);
        for row in 0..batch.num_rows() {
            rev_ids.push(col.value(row));
        }
    }
    assert_eq!(rev_ids, vec![10, 11, 20]);
}

#[test]
fn bzip2_input_produces_identical_rows() {
    let dir = TempDir::new().unwrap();
    let plain_src = write_xml(dir.path(), "dump.xml", single_revision_xml());
    let bz2_src = write_bz2(dir.path(), "dump.xml.bz2", single_revision_xml());

    let plain_dst = dir.path().join("plain.parquet");
    let bz2_dst = dir.path().join("bz2.parquet");

    convert_file(&plain_src, &plain_dst, None, &WriterOptions::default()).unwrap();
    convert_file(&bz2_src, &bz2_dst, None, &WriterOptions::default()).unwrap();

    let plain = read_batches(&plain_dst);
    let compressed = read_batches(&bz2_dst);
    assert_eq!(plain, compressed);
}

#[test]
fn forced_filetype_overrides_sniffing() {
    let dir = TempDir::new().unwrap();
    // A plain XML file with a name suggesting nothing; force xml.
    let src = write_xml(dir.path(), "data.bin", single_revision_xml());
    let dst = dir.path().join("out.parquet");

    convert_file(&src, &dst, Some(FileType::Xml), &WriterOptions::default()).unwrap();
    assert_eq!(total_rows(&dst), 1);
}

// ---------------------------------------------------------------------------
// Boundary cases
// ---------------------------------------------------------------------------

#[test]
fn empty_file_yields_zero_rows() {
    let dir = TempDir::new().unwrap();
    let src = write_xml(dir.path(), "empty.xml", "");
    let dst = dir.path().join("out.parquet");

    let (pages, rows) = convert_file(&src, &dst, None, &WriterOptions::default()).unwrap();
    assert_eq!(pages, 0);
    assert_eq!(rows, 0);
    assert_eq!(total_rows(&dst), 0);
}

#[test]
fn page_without_revisions_emits_no_rows() {
    let xml = r#"<mediawiki><page><title>A</title><ns>0</ns><id>1</id></page></mediawiki>"#;
    let dir = TempDir::new().unwrap();
    let src = write_xml(dir.path(), "dump.xml", xml);
    let dst = dir.path().join("out.parquet");

    let (pages, rows) = convert_file(&src, &dst, None, &WriterOptions::default()).unwrap();
    assert_eq!(pages, 1);
    assert_eq!(rows, 0);
}

#[test]
fn compact_timestamp_layout_is_accepted() {
    let xml = r#"<mediawiki><page><title>A</title><ns>0</ns><id>1</id>
<revision><id>10</id><timestamp>20240115093000</timestamp>
<contributor><id>5</id></contributor>
<model>wikitext</model><format>text/x-wiki</format>
<text>hello</text><sha1>abc</sha1></revision></page></mediawiki>"#;

    let dir = TempDir::new().unwrap();
    let src = write_xml(dir.path(), "dump.xml", xml);
    let dst = dir.path().join("out.parquet");
    convert_file(&src, &dst, None, &WriterOptions::default()).unwrap();

    let batches = read_batches(&dst);
    let timestamps: &TimestampMillisecondArray =
        batches[0].column(7).as_any().downcast_ref().unwrap();
    assert_eq!(timestamps.value(0), 1_705_311_000_000);
}

#[test]
fn parse_error_keeps_rows_read_so_far() {
    let xml = r#"<mediawiki>
<page><title>A</title><ns>0</ns><id>1</id>
<revision><id>10</id><timestamp>2024-01-15T09:30:00Z</timestamp>
<contributor><id>5</id></contributor>
<model>wikitext</model><format>text/x-wiki</format>
<text>a</text><sha1>aaa</sha1></revision></page>
<page><title>B</broken></mediawiki>"#;

    let dir = TempDir::new().unwrap();
    let src = write_xml(dir.path(), "dump.xml", xml);
    let dst = dir.path().join("out.parquet");

    let (pages, rows) = convert_file(&src, &dst, None, &WriterOptions::default()).unwrap();
    assert_eq!(pages, 1);
    assert_eq!(rows, 1);
}

// ---------------------------------------------------------------------------
// Multi-partition fan-out
// ---------------------------------------------------------------------------

#[test]
fn directory_conversion_fans_out_across_workers() {
    let src_dir = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();

    write_xml(src_dir.path(), "alpha.xml", single_revision_xml());
    write_xml(src_dir.path(), "beta.xml", single_revision_xml());
    write_bz2(src_dir.path(), "gamma.xml.bz2", single_revision_xml());

    let mut srcs: Vec<PathBuf> = fs::read_dir(src_dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    srcs.sort();

    let dsts = derive_targets(out_dir.path(), &srcs);
    let jobs: Vec<Job> = srcs
        .into_iter()
        .zip(dsts.clone())
        .map(|(src, dst)| Job { src, dst })
        .collect();

    convert_all(jobs, 2, None, &WriterOptions::default()).unwrap();

    for stem in ["alpha", "beta", "gamma"] {
        let path = out_dir.path().join(format!("{stem}.part-0.parquet"));
        assert!(path.exists(), "missing output: {}", path.display());
        assert_eq!(total_rows(&path), 1);
    }
}

#[test]
fn failing_job_does_not_disturb_other_workers() {
    let src_dir = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();

    let good = write_xml(src_dir.path(), "good.xml", single_revision_xml());
    let missing = src_dir.path().join("missing.xml");

    let jobs = vec![
        Job {
            src: missing,
            dst: out_dir.path().join("missing.part-0.parquet"),
        },
        Job {
            src: good,
            dst: out_dir.path().join("good.part-0.parquet"),
        },
    ];

    convert_all(jobs, 2, None, &WriterOptions::default()).unwrap();

    let good_out = out_dir.path().join("good.part-0.parquet");
    assert!(good_out.exists());
    assert_eq!(total_rows(&good_out), 1);
}

#[test]
fn single_threaded_pool_processes_every_job() {
    let src_dir = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();

    let jobs: Vec<Job> = (0..4)
        .map(|index| {
            let src = write_xml(
                src_dir.path(),
                &format!("dump{index}.xml"),
                single_revision_xml(),
            );
            Job {
                src,
                dst: out_dir.path().join(format!("dump{index}.part-0.parquet")),
            }
        })
        .collect();

    convert_all(jobs, 1, None, &WriterOptions::default()).unwrap();

    let mut total = 0;
    for index in 0..4 {
        total += total_rows(&out_dir.path().join(format!("dump{index}.part-0.parquet")));
    }
    assert_eq!(total, 4);
}
