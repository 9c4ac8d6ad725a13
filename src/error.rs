use std::path::PathBuf;

use crate::data::Axis;

/// Failure to bring a table or dataset into memory.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed csv in {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("{path:?} is missing required column `{column}`")]
    MissingColumn { path: PathBuf, column: String },
    #[error("{path:?} is empty")]
    Empty { path: PathBuf },
    #[error("bad value `{value}` for column `{column}` in {path:?} (record {record})")]
    BadValue {
        path: PathBuf,
        column: String,
        record: u64,
        value: String,
    },
    #[error("no dataset could be loaded")]
    NoDatasets,
}

/// Failure to build the figures for one `(step, dataset)` key.
///
/// Every variant is deterministic for a given store, so results carrying
/// one are safe to cache.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("no bounding box for step {step}")]
    MissingBounds { step: i64 },
    #[error("inverted {axis} bounds at step {step}: lo={lo} hi={hi}")]
    DataIntegrity {
        step: i64,
        axis: Axis,
        lo: f64,
        hi: f64,
    },
    #[error("unknown dataset `{name}`")]
    UnknownDataset { name: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse TOML {path:?}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("unknown colorscale `{0}`")]
    UnknownColorscale(String),
    #[error("dataset `{0}` is declared more than once")]
    DuplicateDataset(String),
    #[error("aspect divisors must be finite and positive, got {0:?}")]
    BadAspectDivisors([f64; 3]),
}
