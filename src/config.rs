/// Capacity of the compressed-side read buffer feeding the bzip2 decoder.
pub const BZ2_BUF_SIZE: usize = 16 * 1024;

/// Capacity of the decoded-side buffer the XML scanner reads from.
pub const XML_BUF_SIZE: usize = 4096;

/// Maximum number of rows per Parquet row group.
pub const MAX_ROW_GROUP_LEN: usize = 1000;

/// Default ZSTD compression level for output files.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 9;

/// Creator string embedded in output file metadata.
pub const CREATED_BY: &str = "mediawiki2parquet";

/// Progress update interval (tick every N pages).
pub const PROGRESS_INTERVAL: u64 = 1000;
