//! Raw input handling for the geosearch gazetteer.
//!
//! Parses GeoNames-style tab-separated dumps into [`PlaceRecord`]s, loads the
//! feature class/code description table, and resolves where on disk the
//! index and its side files live.
use once_cell::sync::Lazy;
use std::path::{Path, PathBuf};
use tracing::debug;

pub mod raw;
pub mod test_data;

pub use error::{DataError, Result};
pub use raw::{
    FIELD_COUNT, FIELD_NAMES, FeatureClass, FeatureCode, FeatureCodeTable, FeatureDescription,
    PlaceRecord, RecordReader, open_records, parse_record_line,
};

/// Environment variable that overrides the data directory.
pub const DATA_DIR_ENV: &str = "GEOSEARCH_DATA";
pub const DATA_DIR_DEFAULT: &str = "./geosearch_data";
/// Subdirectory of the data directory holding the index.
pub const INDEX_DIR_NAME: &str = "indexdir";
/// File in the data directory holding the feature-code table.
pub const FEATURE_CODES_FILE: &str = "placecodes.json";

/// Global data directory, resolved once per process.
pub static DATA_DIR: Lazy<PathBuf> = Lazy::new(resolve_data_dir);

pub fn get_data_dir() -> &'static Path {
    DATA_DIR.as_path()
}

/// Resolve the data directory.
///
/// `GEOSEARCH_DATA` wins when set and non-empty. Otherwise, with the
/// `system-dirs` feature, the platform data directory for `geosearch` is used,
/// falling back to [`DATA_DIR_DEFAULT`].
pub fn resolve_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(DATA_DIR_ENV).filter(|v| !v.is_empty()) {
        debug!(dir = ?dir, "Using data directory from {DATA_DIR_ENV}");
        return PathBuf::from(dir);
    }

    #[cfg(feature = "system-dirs")]
    if let Some(dirs) = directories::ProjectDirs::from("", "", "geosearch") {
        return dirs.data_dir().to_path_buf();
    }

    PathBuf::from(DATA_DIR_DEFAULT)
}

pub fn index_dir(data_dir: impl AsRef<Path>) -> PathBuf {
    data_dir.as_ref().join(INDEX_DIR_NAME)
}

pub fn feature_codes_path(data_dir: impl AsRef<Path>) -> PathBuf {
    data_dir.as_ref().join(FEATURE_CODES_FILE)
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum DataError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
        #[error("Serialization error: {0}")]
        Serde(#[from] serde_json::Error),
        #[error("Malformed record on line {line}: expected {expected} fields, found {found}")]
        FieldCount {
            line: u64,
            expected: usize,
            found: usize,
        },
        #[error("Malformed record on line {line}: invalid {field} value {value:?}")]
        InvalidField {
            line: u64,
            field: &'static str,
            value: String,
        },
    }

    impl DataError {
        /// True for errors caused by a bad source line rather than by I/O.
        pub const fn is_malformed_record(&self) -> bool {
            matches!(self, Self::FieldCount { .. } | Self::InvalidField { .. })
        }
    }

    pub type Result<T> = std::result::Result<T, DataError>;
}
