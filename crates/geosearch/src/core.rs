//! The [`GeoSearch`] facade.
//!
//! Ties the index, the query engines, the hierarchy resolver and the
//! feature-code enricher together: a query runs against the index, then
//! every hit is resolved and described independently.
//!
//! ```no_run
//! use geosearch::{GeoSearch, SearchConfig};
//!
//! let engine = GeoSearch::open_default()?;
//! for result in engine.find("San Francisco", &SearchConfig::default())? {
//!     println!("{:.3} {}", result.score, result.place.record.name);
//!     if let Some(state) = &result.place.hierarchy.admin1 {
//!         println!("  in {}", state.name);
//!     }
//! }
//! # Ok::<(), geosearch::error::GeoSearchError>(())
//! ```
use std::fmt;
use std::path::{Path, PathBuf};

use geosearch_data_processing::{PlaceRecord, feature_codes_path, get_data_dir, index_dir};
use rayon::prelude::*;
use tantivy::Searcher;
use tracing::{info, instrument};

use crate::backfill::{AdminHierarchy, resolve_hierarchy};
use crate::build::{BuildOutcome, ProgressSink, SourcesReport, build_file, build_sources};
use crate::config::{BuildOptions, SearchConfig};
use crate::enrich::FeatureCodeEnricher;
use crate::error::Result;
use crate::index::PlaceIndex;
use crate::search::{MatchTier, ScoredRecord, search_bbox_in, search_text_in};

/// A matched place with its descriptions and containing divisions.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub record: PlaceRecord,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub feature_class_descr: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub feature_code_short: Option<String>,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub feature_code_full: Option<String>,
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub hierarchy: AdminHierarchy,
}

impl Place {
    /// A bare place: no descriptions, no hierarchy.
    pub fn new(record: PlaceRecord) -> Self {
        Self {
            record,
            feature_class_descr: None,
            feature_code_short: None,
            feature_code_full: None,
            hierarchy: AdminHierarchy::default(),
        }
    }
}

impl fmt::Display for Place {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.record.name, self.record.id)?;
        if !self.hierarchy.is_empty() {
            write!(f, " {}", self.hierarchy)?;
        }
        Ok(())
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub score: f32,
    pub place: Place,
}

impl fmt::Display for SearchResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SearchResult {{ score: {:.4}, place: {} }}", self.score, self.place)
    }
}

/// Results of a name search together with the tier that produced them.
#[derive(Debug, Clone, Default)]
pub struct DetailedResults {
    pub tier: Option<MatchTier>,
    pub results: Vec<SearchResult>,
}

/// Query engine over one index directory.
#[derive(Debug, Clone)]
pub struct GeoSearch {
    data_dir: PathBuf,
    index: PlaceIndex,
    enricher: FeatureCodeEnricher,
}

impl GeoSearch {
    /// Open the index under `data_dir`.
    ///
    /// Fails with `IndexNotFound` if no index was ever built there. The
    /// feature-code table is read lazily from `data_dir/placecodes.json`.
    #[instrument(name = "Open GeoSearch", level = "info")]
    pub fn open(data_dir: &Path) -> Result<Self> {
        let index = PlaceIndex::open(&index_dir(data_dir))?;
        let enricher = FeatureCodeEnricher::new(feature_codes_path(data_dir));
        info!(num_docs = index.num_docs(), "GeoSearch ready");
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            index,
            enricher,
        })
    }

    /// Open the index in the default data directory.
    pub fn open_default() -> Result<Self> {
        Self::open(get_data_dir())
    }

    /// Assemble an engine from already opened parts.
    pub fn from_parts(data_dir: &Path, index: PlaceIndex, enricher: FeatureCodeEnricher) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            index,
            enricher,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub const fn index(&self) -> &PlaceIndex {
        &self.index
    }

    pub const fn enricher(&self) -> &FeatureCodeEnricher {
        &self.enricher
    }

    /// Search place names.
    pub fn find(&self, query: &str, config: &SearchConfig) -> Result<Vec<SearchResult>> {
        Ok(self.find_detailed(query, config)?.results)
    }

    /// Search place names, also reporting which match tier answered.
    #[instrument(name = "Find", skip(self, config), level = "info")]
    pub fn find_detailed(&self, query: &str, config: &SearchConfig) -> Result<DetailedResults> {
        let searcher = self.index.searcher();
        let matches = search_text_in(
            &self.index,
            &searcher,
            query,
            config.limit,
            config.max_fuzzy_distance,
        )?;
        Ok(DetailedResults {
            tier: matches.tier,
            results: self.complete(&searcher, matches.hits, config)?,
        })
    }

    /// Places inside the square of half side `config.bbox_half_width`
    /// around a position, nearest first.
    #[instrument(name = "Find position", skip(self, config), level = "info")]
    pub fn find_position(
        &self,
        latitude: f64,
        longitude: f64,
        config: &SearchConfig,
    ) -> Result<Vec<SearchResult>> {
        let searcher = self.index.searcher();
        let hits = search_bbox_in(
            &self.index,
            &searcher,
            latitude,
            longitude,
            config.limit,
            config.bbox_half_width,
        )?;
        self.complete(&searcher, hits, config)
    }

    /// Every place stored under `id`, fully described. More than one only
    /// after an add-only append.
    pub fn get(&self, id: &str) -> Result<Vec<Place>> {
        let searcher = self.index.searcher();
        let config = SearchConfig::default();
        self.index
            .find_by_id(id)?
            .into_iter()
            .map(|record| self.place(&searcher, record, &config))
            .collect()
    }

    /// Pick up commits made since the engine was opened.
    pub fn reload(&self) -> Result<()> {
        Ok(self.index.reload()?)
    }

    /// Build the index under `data_dir` from one dump file.
    pub fn build<P>(
        data_dir: &Path,
        source: &Path,
        options: &BuildOptions,
        progress: &P,
    ) -> Result<BuildOutcome>
    where
        P: ProgressSink + ?Sized,
    {
        Ok(build_file(&index_dir(data_dir), source, options, progress)?)
    }

    /// Build the index under `data_dir` from several dump files, skipping
    /// files with malformed records.
    pub fn build_sources<S, P>(
        data_dir: &Path,
        sources: &[S],
        options: &BuildOptions,
        progress: &P,
    ) -> Result<SourcesReport>
    where
        S: AsRef<Path>,
        P: ProgressSink + ?Sized,
    {
        Ok(build_sources(&index_dir(data_dir), sources, options, progress)?)
    }

    /// Resolve and describe `hits` against the snapshot they were read from.
    fn complete(
        &self,
        searcher: &Searcher,
        hits: Vec<ScoredRecord>,
        config: &SearchConfig,
    ) -> Result<Vec<SearchResult>> {
        let to_result = |hit: ScoredRecord| -> Result<SearchResult> {
            Ok(SearchResult {
                score: hit.score,
                place: self.place(searcher, hit.record, config)?,
            })
        };
        if config.parallel_enrichment && hits.len() > 1 {
            hits.into_par_iter().map(to_result).collect()
        } else {
            hits.into_iter().map(to_result).collect()
        }
    }

    fn place(&self, searcher: &Searcher, record: PlaceRecord, config: &SearchConfig) -> Result<Place> {
        let hierarchy = if config.hierarchy {
            resolve_hierarchy(&self.index, searcher, &record)?
        } else {
            AdminHierarchy::default()
        };
        let mut place = Place {
            hierarchy,
            ..Place::new(record)
        };
        if config.expand_codes {
            let description = self.enricher.describe(&place.record);
            place.feature_class_descr = description.class_descr;
            place.feature_code_short = Some(description.code_short);
            place.feature_code_full = Some(description.code_full);
        }
        Ok(place)
    }
}
