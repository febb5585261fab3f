//! Healthy-operation corpus and its CSV form.
//!
//! The file is plain CSV with a header row. Reading selects the four
//! canonical columns by name (extra columns and column order don't matter)
//! and rejects missing, non-numeric and non-finite values with the row
//! they were found on.

use std::fs::File;
use std::io::Seek;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, Float64Array};
use arrow::compute::cast;
use arrow::csv::reader::Format;
use arrow::csv::{ReaderBuilder, WriterBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chargewatch_core::{Feature, SensorReading, FEATURES};
use tracing::info;

use crate::error::TrainingDataError;

/// Ordered set of readings presumed to come from a healthy station.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingCorpus {
    rows: Vec<SensorReading>,
}

impl TrainingCorpus {
    /// Wrap readings, enforcing the corpus invariants: non-empty, every
    /// value finite.
    pub fn from_readings(rows: Vec<SensorReading>) -> Result<Self, TrainingDataError> {
        if rows.is_empty() {
            return Err(TrainingDataError::Empty);
        }
        for (row, reading) in rows.iter().enumerate() {
            for feature in Feature::ALL {
                let value = reading.get(feature);
                if !value.is_finite() {
                    return Err(TrainingDataError::InvalidValue {
                        column: feature.name().to_string(),
                        row,
                        reason: format!("non-finite value {value}"),
                    });
                }
            }
        }
        Ok(Self { rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[SensorReading] {
        &self.rows
    }

    /// One column in row order.
    pub fn column(&self, feature: Feature) -> Vec<f64> {
        self.rows.iter().map(|r| r.get(feature)).collect()
    }

    /// Row-major feature matrix in canonical order, the shape the forest fits on.
    pub fn feature_matrix(&self) -> Vec<Vec<f64>> {
        self.rows.iter().map(|r| r.to_array().to_vec()).collect()
    }

    /// (mean, population std-dev) of one column.
    pub fn column_stats(&self, feature: Feature) -> (f64, f64) {
        let n = self.rows.len() as f64;
        let mean = self.rows.iter().map(|r| r.get(feature)).sum::<f64>() / n;
        let var = self
            .rows
            .iter()
            .map(|r| {
                let d = r.get(feature) - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        (mean, var.sqrt())
    }
}

fn corpus_schema() -> Schema {
    Schema::new(
        FEATURES
            .iter()
            .map(|name| Field::new(*name, DataType::Float64, false))
            .collect::<Vec<_>>(),
    )
}

/// Write the corpus as CSV with a header row, creating parent directories.
pub fn write_corpus(path: &Path, corpus: &TrainingCorpus) -> Result<(), TrainingDataError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let columns: Vec<ArrayRef> = Feature::ALL
        .iter()
        .map(|f| Arc::new(Float64Array::from(corpus.column(*f))) as ArrayRef)
        .collect();
    let batch = RecordBatch::try_new(Arc::new(corpus_schema()), columns)?;

    let file = File::create(path)?;
    let mut writer = WriterBuilder::new().with_header(true).build(file);
    writer.write(&batch)?;

    info!(rows = corpus.len(), path = %path.display(), "corpus written");
    Ok(())
}

/// Read a corpus CSV written by [`write_corpus`] (or any CSV with the
/// canonical columns).
pub fn read_corpus(path: &Path) -> Result<TrainingCorpus, TrainingDataError> {
    if !path.exists() {
        return Err(TrainingDataError::NotFound(path.to_path_buf()));
    }

    let mut file = File::open(path)?;
    let (schema, _) = Format::default()
        .with_header(true)
        .infer_schema(&mut file, None)?;
    file.rewind()?;

    let indices = FEATURES
        .iter()
        .map(|name| {
            schema
                .index_of(name)
                .map_err(|_| TrainingDataError::MissingColumn(name.to_string()))
        })
        .collect::<Result<Vec<usize>, _>>()?;

    let reader = ReaderBuilder::new(Arc::new(schema))
        .with_header(true)
        .build(file)?;

    let mut rows = Vec::new();
    for batch in reader {
        let batch = batch?;
        let offset = rows.len();

        let columns = indices
            .iter()
            .map(|&i| {
                let raw = batch.column(i).clone();
                let floats = cast(raw.as_ref(), &DataType::Float64)?;
                Ok((raw, floats))
            })
            .collect::<Result<Vec<(ArrayRef, ArrayRef)>, TrainingDataError>>()?;

        for row in 0..batch.num_rows() {
            let mut values = [0.0; 4];
            for (k, (raw, floats)) in columns.iter().enumerate() {
                values[k] = cell(raw, floats, row, FEATURES[k], offset + row)?;
            }
            rows.push(SensorReading::from_array(values));
        }
    }

    let corpus = TrainingCorpus::from_readings(rows)?;
    info!(rows = corpus.len(), path = %path.display(), "corpus loaded");
    Ok(corpus)
}

fn cell(
    raw: &ArrayRef,
    floats: &ArrayRef,
    row: usize,
    column: &str,
    global_row: usize,
) -> Result<f64, TrainingDataError> {
    let invalid = |reason: String| TrainingDataError::InvalidValue {
        column: column.to_string(),
        row: global_row,
        reason,
    };

    if raw.is_null(row) {
        return Err(invalid("missing value".into()));
    }
    let floats = floats
        .as_any()
        .downcast_ref::<Float64Array>()
        .ok_or_else(|| invalid("column is not numeric".into()))?;
    if floats.is_null(row) {
        return Err(invalid("not a number".into()));
    }
    let value = floats.value(row);
    if !value.is_finite() {
        return Err(invalid(format!("non-finite value {value}")));
    }
    Ok(value)
}
