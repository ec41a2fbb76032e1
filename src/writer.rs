//! Parquet output binding.
//!
//! One row per `(page, revision)` pair with a flat 17-column schema,
//! written through the Arrow writer with ZSTD column compression.

use crate::config::{CREATED_BY, DEFAULT_COMPRESSION_LEVEL, MAX_ROW_GROUP_LEN};
use crate::models::{Page, Revision};
use anyhow::{bail, Context, Result};
use arrow::array::{
    ArrayRef, BooleanBuilder, StringBuilder, TimestampMillisecondBuilder, UInt64Builder,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::{EnabledStatistics, WriterProperties, WriterVersion};
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

/// Output tuning taken from the CLI.
#[derive(Debug, Clone)]
pub struct WriterOptions {
    pub codec: String,
    pub level: u32,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            codec: "zstd".to_string(),
            level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

/// The flat schema for flattened `(page, revision)` rows.
pub fn page_schema() -> Schema {
    Schema::new(vec![
        Field::new("title", DataType::Utf8, false),
        Field::new("ns", DataType::UInt64, false),
        Field::new("id", DataType::UInt64, false),
        Field::new("redirect", DataType::Utf8, true),
        Field::new("restrictions", DataType::Utf8, true),
        Field::new("rev_id", DataType::UInt64, false),
        Field::new("rev_parent_id", DataType::UInt64, true),
        Field::new(
            "rev_timestamp",
            DataType::Timestamp(TimeUnit::Millisecond, Some("UTC".into())),
            false,
        ),
        Field::new("rev_contrib_username", DataType::Utf8, true),
        Field::new("rev_contrib_id", DataType::UInt64, true),
        Field::new("rev_contrib_ip", DataType::Utf8, true),
        Field::new("rev_minor", DataType::Boolean, false),
        Field::new("rev_comment", DataType::Utf8, true),
        Field::new("rev_model", DataType::Utf8, false),
        Field::new("rev_format", DataType::Utf8, false),
        Field::new("rev_text", DataType::Utf8, false),
        Field::new("rev_sha1", DataType::Utf8, false),
    ])
}

/// The schema wrapped in an `Arc` for the Arrow writer APIs.
pub fn page_schema_ref() -> Arc<Schema> {
    Arc::new(page_schema())
}

struct RowBuilders {
    title: StringBuilder,
    ns: UInt64Builder,
    id: UInt64Builder,
    redirect: StringBuilder,
    restrictions: StringBuilder,
    rev_id: UInt64Builder,
    rev_parent_id: UInt64Builder,
    rev_timestamp: TimestampMillisecondBuilder,
    rev_contrib_username: StringBuilder,
    rev_contrib_id: UInt64Builder,
    rev_contrib_ip: StringBuilder,
    rev_minor: BooleanBuilder,
    rev_comment: StringBuilder,
    rev_model: StringBuilder,
    rev_format: StringBuilder,
    rev_text: StringBuilder,
    rev_sha1: StringBuilder,
    rows: usize,
}

impl RowBuilders {
    fn new() -> Self {
        Self {
            title: StringBuilder::new(),
            ns: UInt64Builder::new(),
            id: UInt64Builder::new(),
            redirect: StringBuilder::new(),
            restrictions: StringBuilder::new(),
            rev_id: UInt64Builder::new(),
            rev_parent_id: UInt64Builder::new(),
            rev_timestamp: TimestampMillisecondBuilder::new().with_timezone("UTC"),
            rev_contrib_username: StringBuilder::new(),
            rev_contrib_id: UInt64Builder::new(),
            rev_contrib_ip: StringBuilder::new(),
            rev_minor: BooleanBuilder::new(),
            rev_comment: StringBuilder::new(),
            rev_model: StringBuilder::new(),
            rev_format: StringBuilder::new(),
            rev_text: StringBuilder::new(),
            rev_sha1: StringBuilder::new(),
            rows: 0,
        }
    }

    fn append(&mut self, page: &Page, rev: &Revision) {
        self.title.append_value(&page.title);
        self.ns.append_value(page.ns);
        self.id.append_value(page.id);
        self.redirect.append_option(page.redirect.as_deref());
        self.restrictions.append_option(page.restrictions.as_deref());
        self.rev_id.append_value(rev.id);
        self.rev_parent_id.append_option(rev.parent_id);
        self.rev_timestamp.append_value(rev.timestamp as i64);
        self.rev_contrib_username
            .append_option(rev.contributor.username.as_deref());
        self.rev_contrib_id.append_option(rev.contributor.id);
        self.rev_contrib_ip
            .append_option(rev.contributor.ip.as_deref());
        self.rev_minor.append_value(rev.minor);
        self.rev_comment.append_option(rev.comment.as_deref());
        self.rev_model.append_value(&rev.model);
        self.rev_format.append_value(&rev.format);
        self.rev_text.append_value(&rev.text);
        self.rev_sha1.append_value(&rev.sha1);
        self.rows += 1;
    }

    fn finish(&mut self, schema: &Arc<Schema>) -> Result<RecordBatch> {
        let columns: Vec<ArrayRef> = vec![
            Arc::new(self.title.finish()),
            Arc::new(self.ns.finish()),
            Arc::new(self.id.finish()),
            Arc::new(self.redirect.finish()),
            Arc::new(self.restrictions.finish()),
            Arc::new(self.rev_id.finish()),
            Arc::new(self.rev_parent_id.finish()),
            Arc::new(self.rev_timestamp.finish()),
            Arc::new(self.rev_contrib_username.finish()),
            Arc::new(self.rev_contrib_id.finish()),
            Arc::new(self.rev_contrib_ip.finish()),
            Arc::new(self.rev_minor.finish()),
            Arc::new(self.rev_comment.finish()),
            Arc::new(self.rev_model.finish()),
            Arc::new(self.rev_format.finish()),
            Arc::new(self.rev_text.finish()),
            Arc::new(self.rev_sha1.finish()),
        ];
        self.rows = 0;
        RecordBatch::try_new(schema.clone(), columns).context("failed to assemble record batch")
    }
}

/// Writes pages to one Parquet file, one row per revision.
pub struct PageWriter {
    writer: ArrowWriter<File>,
    schema: Arc<Schema>,
    builders: RowBuilders,
    rows_written: u64,
}

impl PageWriter {
    pub fn create(path: &Path, opts: &WriterOptions) -> Result<Self> {
        let props = WriterProperties::builder()
            .set_writer_version(WriterVersion::PARQUET_2_0)
            .set_compression(compression_for(opts)?)
            .set_created_by(CREATED_BY.to_string())
            .set_statistics_enabled(EnabledStatistics::Chunk)
            .set_max_row_group_size(MAX_ROW_GROUP_LEN)
            .build();

        let file = File::create(path)
            .with_context(|| format!("failed to create output file: {}", path.display()))?;
        let schema = page_schema_ref();
        let writer = ArrowWriter::try_new(file, schema.clone(), Some(props))
            .context("failed to open Parquet writer")?;

        Ok(Self {
            writer,
            schema,
            builders: RowBuilders::new(),
            rows_written: 0,
        })
    }

    /// Appends one row per revision, in page-then-revision order.
    pub fn write_page(&mut self, page: &Page) -> Result<()> {
        for rev in &page.revisions {
            self.builders.append(page, rev);
            if self.builders.rows >= MAX_ROW_GROUP_LEN {
                self.flush()?;
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.builders.rows == 0 {
            return Ok(());
        }
        self.rows_written += self.builders.rows as u64;
        let batch = self.builders.finish(&self.schema)?;
        self.writer.write(&batch).context("failed to write row group")?;
        Ok(())
    }

    /// Finalizes the file and returns the number of rows written.
    pub fn close(mut self) -> Result<u64> {
        self.flush()?;
        self.writer
            .close()
            .context("failed to finalize Parquet file")?;
        Ok(self.rows_written)
    }
}

fn compression_for(opts: &WriterOptions) -> Result<Compression> {
    match opts.codec.as_str() {
        "zstd" => {
            let level = ZstdLevel::try_new(opts.level as i32).map_err(|err| {
                anyhow::anyhow!("invalid zstd compression level {}: {err}", opts.level)
            })?;
            Ok(Compression::ZSTD(level))
        }
        other => bail!("unsupported compression codec: {other}"),
    }
}
