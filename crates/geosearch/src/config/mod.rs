//! Query and build configuration.
//!
//! [`SearchConfig`] controls a single query; [`BuildOptions`] controls an
//! index build. Both come with builders carrying the usual presets.
use crate::error::GeoSearchError;

/// Default bounding-box half width, in degrees.
pub const DEFAULT_BBOX_HALF_WIDTH: f64 = 0.001;
/// Records per committed batch.
pub const DEFAULT_BATCH_SIZE: usize = 1_000_000;
pub const DEFAULT_WRITER_MEMORY_BYTES: usize = 200_000_000;

/// Configuration for a single query.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    /// Maximum number of results returned.
    pub limit: usize,
    /// Highest fuzzy tier attempted (0, 1 or 2). Anything larger is rejected
    /// at query time.
    pub max_fuzzy_distance: u8,
    /// Half the side of the square used by position queries, in degrees.
    pub bbox_half_width: f64,
    /// Attach `admin1`..`admin4` summaries to every hit.
    pub hierarchy: bool,
    /// Fill in feature class and code descriptions.
    pub expand_codes: bool,
    /// Resolve hierarchy and descriptions for hits on the rayon pool.
    pub parallel_enrichment: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            max_fuzzy_distance: 2,
            bbox_half_width: DEFAULT_BBOX_HALF_WIDTH,
            hierarchy: true,
            expand_codes: true,
            parallel_enrichment: true,
        }
    }
}

impl SearchConfig {
    pub fn builder() -> SearchConfigBuilder {
        SearchConfigBuilder::new()
    }
}

/// Builder for creating search configurations with ergonomic defaults
#[derive(Debug, Clone, Default)]
pub struct SearchConfigBuilder {
    config: SearchConfig,
}

impl SearchConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: SearchConfig::default(),
        }
    }

    /// Exact token matches only; no fuzzy fallback.
    pub fn exact_only() -> Self {
        let mut builder = Self::new();
        builder.config.max_fuzzy_distance = 0;
        builder
    }

    /// Cheaper queries: one fuzzy tier, no hierarchy lookups.
    pub fn fast() -> Self {
        let mut builder = Self::new();
        builder.config.limit = 5;
        builder.config.max_fuzzy_distance = 1;
        builder.config.hierarchy = false;
        builder
    }

    /// Set the maximum number of results to return
    pub fn limit(mut self, limit: usize) -> Self {
        self.config.limit = limit;
        self
    }

    pub fn max_fuzzy_distance(mut self, distance: u8) -> Self {
        self.config.max_fuzzy_distance = distance;
        self
    }

    pub fn bbox_half_width(mut self, half_width: f64) -> Self {
        self.config.bbox_half_width = half_width;
        self
    }

    /// Enable or disable administrative hierarchy resolution
    pub fn hierarchy(mut self, enabled: bool) -> Self {
        self.config.hierarchy = enabled;
        self
    }

    /// Enable or disable feature-code descriptions
    pub fn expand_codes(mut self, enabled: bool) -> Self {
        self.config.expand_codes = enabled;
        self
    }

    pub fn parallel_enrichment(mut self, enabled: bool) -> Self {
        self.config.parallel_enrichment = enabled;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> SearchConfig {
        self.config
    }
}

/// Whether a build starts from an empty index or extends an existing one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BuildMode {
    /// Discard any existing index and start empty.
    #[default]
    Replace,
    /// Insert on top of an existing index, which must already exist.
    Append,
}

/// What happens when an inserted record's `id` is already indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Delete earlier documents with the same id; the last write wins.
    Upsert,
    /// Insert regardless, leaving several documents with the same id.
    AddOnly,
}

/// Options for an index build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    pub mode: BuildMode,
    /// Overrides the mode's duplicate handling when set.
    pub duplicate_policy: Option<DuplicatePolicy>,
    /// Records per committed batch.
    pub batch_size: usize,
    /// Overrides the mode's segment compaction after each commit when set.
    pub compact_on_commit: Option<bool>,
    /// Indexing memory budget shared by the writer threads.
    pub writer_memory_bytes: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            mode: BuildMode::Replace,
            duplicate_policy: None,
            batch_size: DEFAULT_BATCH_SIZE,
            compact_on_commit: None,
            writer_memory_bytes: DEFAULT_WRITER_MEMORY_BYTES,
        }
    }
}

impl BuildOptions {
    pub fn builder() -> BuildOptionsBuilder {
        BuildOptionsBuilder::new()
    }

    /// Upsert under `Replace`, add-only under `Append`, unless overridden.
    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.duplicate_policy.unwrap_or(match self.mode {
            BuildMode::Replace => DuplicatePolicy::Upsert,
            BuildMode::Append => DuplicatePolicy::AddOnly,
        })
    }

    /// Compact under `Replace`, leave segments alone under `Append`, unless
    /// overridden.
    pub fn compacts(&self) -> bool {
        self.compact_on_commit
            .unwrap_or(self.mode == BuildMode::Replace)
    }

    /// Same effective policies, applied on top of the index just built.
    pub(crate) fn continuing(&self) -> Self {
        Self {
            mode: BuildMode::Append,
            duplicate_policy: Some(self.duplicate_policy()),
            compact_on_commit: Some(self.compacts()),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptionsBuilder {
    options: BuildOptions,
}

impl BuildOptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: BuildOptions::default(),
        }
    }

    pub fn mode(mut self, mode: BuildMode) -> Self {
        self.options.mode = mode;
        self
    }

    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.options.duplicate_policy = Some(policy);
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.options.batch_size = batch_size;
        self
    }

    pub fn compact_on_commit(mut self, compact: bool) -> Self {
        self.options.compact_on_commit = Some(compact);
        self
    }

    pub fn writer_memory_bytes(mut self, bytes: usize) -> Self {
        self.options.writer_memory_bytes = bytes;
        self
    }

    pub fn build(self) -> Result<BuildOptions, GeoSearchError> {
        if self.options.batch_size == 0 {
            return Err(GeoSearchError::ConfigError(
                "Batch size must be greater than zero".to_owned(),
            ));
        }
        Ok(self.options)
    }
}
