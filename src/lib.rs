//! mediawiki2parquet: streaming conversion of MediaWiki XML dumps to Parquet.
//!
//! Dumps arrive as large, optionally bzip2-compressed XML files whose
//! logical content is a sequence of `<page>` elements with embedded
//! revision texts. This crate materializes one page at a time from an
//! arbitrarily large document and writes one Parquet row per
//! `(page, revision)` pair, processing multiple input partitions
//! concurrently.
//!
//! # Architecture
//!
//! The pipeline composes bottom-up:
//!
//! - **Decompression**: [`bz2::Bz2Source`] presents a raw bzip2 stream as
//!   an ordered byte source; decoder failures read as end-of-stream
//! - **Scanning**: [`scanner::XmlScanner`] pumps XML events into a
//!   [`scanner::Machine`] and can be suspended from inside a callback at
//!   any event boundary
//! - **Extraction**: [`machines`] holds one small deterministic automaton
//!   per element subtree (`SiteInfo`, `Contributor`, `Revision`, `Page`),
//!   composed by delegation
//! - **Iteration**: [`reader::PageReader`] pulls pages by advancing the
//!   scanner until the page machine suspends it
//! - **Output**: [`writer::PageWriter`] flattens pages into a fixed
//!   17-column Parquet schema with ZSTD compression
//! - **Fan-out**: [`convert`] distributes (src, dst) jobs across a
//!   bounded worker pool; each worker runs the pipeline above sequentially
//!
//! # Performance notes
//!
//! - Revision texts run to many megabytes; the extraction machines keep
//!   their text buffers alive across revisions so the hot path never
//!   reallocates
//! - `<text bytes="N">` pre-sizes the accumulator before the first
//!   character event arrives
//! - The scanner reuses one event buffer for the whole document

pub mod bz2;
pub mod config;
pub mod convert;
pub mod machines;
pub mod models;
pub mod reader;
pub mod scanner;
pub mod util;
pub mod writer;
