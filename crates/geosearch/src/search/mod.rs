//! Query engines over the place index.
//!
//! Name search cascades through exact and fuzzy tiers; position search is a
//! single bounding-box filter. Both return stored records with their scores,
//! leaving hierarchy and descriptions to the caller.

pub use error::SearchError;
mod spatial;
mod text;

use error::Result;
use geosearch_data_processing::PlaceRecord;
pub use spatial::{search_bbox, search_bbox_in};
pub use text::{MAX_FUZZY_DISTANCE, MatchTier, TextMatches, query_terms, search_text, search_text_in};

/// A stored record together with the score that ranked it.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    pub score: f32,
    pub record: PlaceRecord,
}

mod error {
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum SearchError {
        #[error("Invalid argument: {0}")]
        InvalidArgument(String),
        #[error("Index error: {0}")]
        IndexError(#[from] crate::index::IndexError),
        #[error("Tantivy error: {0}")]
        Tantivy(#[from] tantivy::TantivyError),
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
    }
    pub type Result<T> = std::result::Result<T, SearchError>;
}

#[cfg(test)]
pub(crate) mod test_support {
    use geosearch_data_processing::test_data::sample_lines;
    use tempfile::TempDir;

    use crate::build::build_index;
    use crate::config::BuildOptions;
    use crate::index::PlaceIndex;

    /// The sample gazetteer, plus `extra` lines, indexed into a temp dir.
    pub(crate) fn sample_index(extra: &[String]) -> (TempDir, PlaceIndex) {
        let dir = TempDir::new().unwrap();
        let mut lines = sample_lines();
        lines.extend_from_slice(extra);
        let options = BuildOptions::builder()
            .writer_memory_bytes(15_000_000)
            .build()
            .unwrap();
        let outcome = build_index(
            dir.path(),
            std::io::Cursor::new(lines.join("\n")),
            &options,
            &(),
        )
        .unwrap();
        (dir, outcome.index)
    }
}
