//! Administrative context for matched places.
//!
//! Each hit can carry summaries of the ADM1..ADM4 records that contain it,
//! found by walking its admin codes level by level.
use std::fmt;

use chrono::NaiveDate;
use geosearch_data_processing::PlaceRecord;

mod resolve;

use error::Result;
pub use error::BackfillError;
pub use resolve::{ADMIN_LEVELS, Containment, containment, resolve_hierarchy};

/// A containing administrative record, without its own codes and
/// classification.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct AdminSummary {
    pub id: String,
    pub name: String,
    pub ascii_name: String,
    pub alternate_names: String,
    pub latitude: f64,
    pub longitude: f64,
    pub population: Option<i64>,
    pub elevation: Option<i64>,
    pub dem: Option<i64>,
    pub timezone: String,
    pub modification_date: Option<NaiveDate>,
}

impl From<PlaceRecord> for AdminSummary {
    fn from(record: PlaceRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            ascii_name: record.ascii_name,
            alternate_names: record.alternate_names,
            latitude: record.latitude,
            longitude: record.longitude,
            population: record.population,
            elevation: record.elevation,
            dem: record.dem,
            timezone: record.timezone,
            modification_date: record.modification_date,
        }
    }
}

impl fmt::Display for AdminSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Containing divisions of a place, from state level (`admin1`) down.
///
/// Levels are filled contiguously: if `admin2` is absent, so are `admin3`
/// and `admin4`.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdminHierarchy {
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub admin1: Option<AdminSummary>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub admin2: Option<AdminSummary>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub admin3: Option<AdminSummary>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub admin4: Option<AdminSummary>,
}

impl AdminHierarchy {
    /// Summary at `level` (1-based).
    pub const fn level(&self, level: usize) -> Option<&AdminSummary> {
        match level {
            1 => self.admin1.as_ref(),
            2 => self.admin2.as_ref(),
            3 => self.admin3.as_ref(),
            4 => self.admin4.as_ref(),
            _ => None,
        }
    }

    /// Number of resolved levels.
    pub fn depth(&self) -> usize {
        self.levels().count()
    }

    /// Resolved summaries, outermost first.
    pub fn levels(&self) -> impl Iterator<Item = &AdminSummary> {
        [&self.admin1, &self.admin2, &self.admin3, &self.admin4]
            .into_iter()
            .map_while(Option::as_ref)
    }

    pub fn is_empty(&self) -> bool {
        self.admin1.is_none()
    }

    fn set(&mut self, level: usize, summary: AdminSummary) {
        let slot = match level {
            1 => &mut self.admin1,
            2 => &mut self.admin2,
            3 => &mut self.admin3,
            _ => &mut self.admin4,
        };
        *slot = Some(summary);
    }
}

impl fmt::Display for AdminHierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "AdminHierarchy {{ Empty }}");
        }
        let parts: Vec<String> = self
            .levels()
            .enumerate()
            .map(|(i, summary)| format!("Admin{}: {summary}", i + 1))
            .collect();
        write!(f, "AdminHierarchy {{ {} }}", parts.join(", "))
    }
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum BackfillError {
        #[error("Index error: {0}")]
        IndexError(#[from] crate::index::IndexError),
        #[error("Tantivy error: {0}")]
        Tantivy(#[from] tantivy::TantivyError),
    }
    pub type Result<T> = std::result::Result<T, BackfillError>;
}
