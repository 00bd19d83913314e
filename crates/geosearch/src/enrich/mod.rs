//! Feature class and code descriptions for results.
use std::path::{Path, PathBuf};

use geosearch_data_processing::{FeatureCodeTable, FeatureDescription, PlaceRecord};
use once_cell::sync::OnceCell;
use tracing::{debug, warn};

/// Looks up human-readable feature descriptions.
///
/// The table is read from disk on first use and kept for the lifetime of the
/// enricher. A missing or unreadable file yields an empty table, so every
/// description comes back empty rather than failing.
#[derive(Debug, Clone, Default)]
pub struct FeatureCodeEnricher {
    path: Option<PathBuf>,
    table: OnceCell<FeatureCodeTable>,
}

impl FeatureCodeEnricher {
    /// Enricher backed by the JSON table at `path`, loaded lazily.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            table: OnceCell::new(),
        }
    }

    /// Enricher over an already loaded table.
    pub fn from_table(table: FeatureCodeTable) -> Self {
        Self {
            path: None,
            table: OnceCell::with_value(table),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.table.get().is_some()
    }

    pub fn table(&self) -> &FeatureCodeTable {
        self.table.get_or_init(|| self.load())
    }

    pub fn describe(&self, record: &PlaceRecord) -> FeatureDescription {
        self.table()
            .lookup(&record.feature_class, &record.feature_code)
    }

    fn load(&self) -> FeatureCodeTable {
        let Some(path) = self.path.as_deref() else {
            return FeatureCodeTable::new();
        };
        if !path.exists() {
            warn!(path = ?path, "Feature code table not found; descriptions will be empty");
            return FeatureCodeTable::new();
        }
        match FeatureCodeTable::load(path) {
            Ok(table) => {
                debug!(path = ?path, classes = table.len(), "Feature code table cached");
                table
            }
            Err(e) => {
                warn!(path = ?path, error = %e, "Unreadable feature code table; descriptions will be empty");
                FeatureCodeTable::new()
            }
        }
    }
}
