//! Parquet price history
//!
//! Reads closes from `price_ticks_*.parquet` files in a directory. Prices
//! are stored as strings for Decimal precision.

use super::{PriceHistory, PricePoint, StoreError};
use arrow::array::{Array, ArrayRef, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use rust_decimal::Decimal;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

const FILE_PREFIX: &str = "price_ticks_";

/// Price tick schema fields
pub fn price_tick_schema() -> Schema {
    Schema::new(vec![
        Field::new(
            "timestamp",
            DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
            false,
        ),
        Field::new("symbol", DataType::Utf8, false),
        Field::new("price", DataType::Utf8, false),
    ])
}

/// Record type for price ticks
#[derive(Debug, Clone, PartialEq)]
pub struct PriceTickRecord {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub price: Decimal,
}

impl PriceTickRecord {
    pub fn new(timestamp: DateTime<Utc>, symbol: impl Into<String>, price: Decimal) -> Self {
        Self {
            timestamp,
            symbol: symbol.into(),
            price,
        }
    }
}

/// Write price ticks to a Parquet file, creating parent directories
pub fn write_price_ticks(path: &Path, ticks: &[PriceTickRecord]) -> Result<(), StoreError> {
    if ticks.is_empty() {
        return Ok(());
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let schema = Arc::new(price_tick_schema());
    let file = File::create(path)?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();

    let mut writer = ArrowWriter::try_new(file, schema.clone(), Some(props))?;

    let timestamps: Vec<i64> = ticks
        .iter()
        .map(|t| t.timestamp.timestamp_micros())
        .collect();
    let symbols: Vec<&str> = ticks.iter().map(|t| t.symbol.as_str()).collect();
    let prices: Vec<String> = ticks.iter().map(|t| t.price.to_string()).collect();

    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(TimestampMicrosecondArray::from(timestamps).with_timezone("UTC")) as ArrayRef,
            Arc::new(StringArray::from(symbols)) as ArrayRef,
            Arc::new(StringArray::from(
                prices.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
            )) as ArrayRef,
        ],
    )?;

    writer.write(&batch)?;
    writer.close()?;

    tracing::debug!(path = ?path, count = ticks.len(), "Wrote price ticks to Parquet");

    Ok(())
}

fn read_file(path: &Path, pair: &str) -> Result<Vec<PricePoint>, StoreError> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;

    let mut points = Vec::new();
    for batch in reader {
        let batch = batch?;

        let timestamps = batch
            .column(0)
            .as_any()
            .downcast_ref::<TimestampMicrosecondArray>()
            .ok_or_else(|| StoreError::Corrupt(format!("{}: timestamp column", path.display())))?;
        let symbols = batch
            .column(1)
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| StoreError::Corrupt(format!("{}: symbol column", path.display())))?;
        let prices = batch
            .column(2)
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| StoreError::Corrupt(format!("{}: price column", path.display())))?;

        for i in 0..batch.num_rows() {
            if symbols.is_null(i) || symbols.value(i) != pair {
                continue;
            }
            let timestamp = DateTime::from_timestamp_micros(timestamps.value(i))
                .ok_or_else(|| StoreError::Corrupt(format!("timestamp {}", timestamps.value(i))))?;
            let close = Decimal::from_str(prices.value(i))
                .map_err(|e| StoreError::Corrupt(format!("price {}: {e}", prices.value(i))))?;
            points.push(PricePoint::new(timestamp, close));
        }
    }

    Ok(points)
}

/// Read-only price history over a directory of Parquet tick files
#[derive(Debug, Clone)]
pub struct ParquetPriceHistory {
    dir: PathBuf,
}

impl ParquetPriceHistory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All closes for `pair` across every file, oldest first
    fn load_pair(dir: &Path, pair: &str) -> Result<Vec<PricePoint>, StoreError> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(|n| n.starts_with(FILE_PREFIX) && n.ends_with(".parquet"))
                    .unwrap_or(false)
            })
            .collect();
        files.sort();

        let mut points = Vec::new();
        for file in &files {
            points.extend(read_file(file, pair)?);
        }
        points.sort_by_key(|p| p.timestamp);
        Ok(points)
    }

    async fn load(&self, pair: &str) -> Result<Vec<PricePoint>, StoreError> {
        let dir = self.dir.clone();
        let pair = pair.to_string();
        tokio::task::spawn_blocking(move || Self::load_pair(&dir, &pair)).await?
    }
}

#[async_trait]
impl PriceHistory for ParquetPriceHistory {
    async fn closes_between(
        &self,
        pair: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<PricePoint>, StoreError> {
        Ok(self
            .load(pair)
            .await?
            .into_iter()
            .filter(|p| p.timestamp >= from && p.timestamp <= to)
            .collect())
    }

    async fn close_at_or_before(
        &self,
        pair: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<PricePoint>, StoreError> {
        Ok(self
            .load(pair)
            .await?
            .into_iter()
            .rev()
            .find(|p| p.timestamp <= at))
    }
}
