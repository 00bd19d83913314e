//! Geosearch - offline GeoNames gazetteer search
//!
//! Geosearch builds a local full-text and numeric index from a GeoNames-style
//! dump and answers three kinds of questions against it:
//!
//! - **Name search** with a strict exact, then edit distance 1, then edit
//!   distance 2 fallback. A fuzzy tier is only consulted when every earlier
//!   tier came back empty.
//! - **Position search** over an axis-aligned bounding box.
//! - **Administrative context**: each hit can carry the ADM1..ADM4 records
//!   that contain it, plus human-readable feature class and code descriptions.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//!
//! use geosearch::{BuildOptions, GeoSearch, SearchConfig};
//!
//! let data_dir = Path::new("./geosearch_data");
//!
//! // Index a dump once
//! GeoSearch::build(data_dir, Path::new("allCountries.txt"), &BuildOptions::default(), &())?;
//!
//! // Then query it
//! let engine = GeoSearch::open(data_dir)?;
//! let results = engine.find("Pariss", &SearchConfig::default())?;
//! if let Some(result) = results.first() {
//!     println!("Found: {}", result.place);
//! }
//!
//! let nearby = engine.find_position(48.8534, 2.3488, &SearchConfig::default())?;
//! println!("{} places around Notre-Dame", nearby.len());
//! # Ok::<(), geosearch::error::GeoSearchError>(())
//! ```
//!
//! # Data
//!
//! The index lives in `<data_dir>/indexdir` and feature descriptions are read
//! from `<data_dir>/placecodes.json`. The default data directory comes from
//! the `GEOSEARCH_DATA` environment variable, then the platform data
//! directory, then `./geosearch_data`.
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod backfill;
pub mod build;
mod config;
mod core;
mod enrich;
pub mod error;
pub mod index;
pub mod search;

pub use self::core::{DetailedResults, GeoSearch, Place, SearchResult};

pub use backfill::{
    ADMIN_LEVELS, AdminHierarchy, AdminSummary, BackfillError, Containment, containment,
    resolve_hierarchy,
};
pub use build::{
    BuildOutcome, IndexedSource, ProgressSink, SkippedSource, SourcesReport, build_file,
    build_index, build_sources,
};
pub use config::{
    BuildMode, BuildOptions, BuildOptionsBuilder, DEFAULT_BATCH_SIZE, DEFAULT_BBOX_HALF_WIDTH,
    DuplicatePolicy, SearchConfig, SearchConfigBuilder,
};
pub use enrich::FeatureCodeEnricher;
pub use geosearch_data_processing as data_processing;
pub use geosearch_data_processing::{FeatureCodeTable, PlaceRecord};
pub use index::{IndexError, PlaceIndex};
pub use search::{
    MatchTier, ScoredRecord, SearchError, search_bbox, search_bbox_in, search_text, search_text_in,
};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for the geosearch library.
///
/// Installs a `tracing` fmt subscriber filtered by `RUST_LOG` when set,
/// otherwise by `level`. Tantivy's own logging is capped at `warn`. Only the
/// first call has any effect.
///
/// # Examples
///
/// ```rust
/// use geosearch::init_logging;
/// use tracing::Level;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), geosearch::error::GeoSearchError>(())
/// ```
pub fn init_logging(level: impl Into<LevelFilter>) -> Result<&'static (), error::GeoSearchError> {
    let level: LevelFilter = level.into();
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.to_string()))?
            .add_directive("tantivy=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))?;
        Ok(())
    })
}
