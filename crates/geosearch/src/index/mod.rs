//! On-disk place index.
//!
//! A thin layer over a Tantivy index holding the inverted text index over
//! names and codes, the numeric index over coordinates, and the stored-field
//! store. Commits are atomic: readers see either the previous or the newly
//! committed state, and Tantivy's directory lock keeps to a single writer.

pub mod schema;

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use itertools::Itertools;
pub use error::IndexError;
use error::Result;
use geosearch_data_processing::PlaceRecord;
use tantivy::collector::{Count, TopDocs};
use tantivy::query::TermQuery;
use tantivy::schema::{IndexRecordOption, Value};
use tantivy::{
    DateTime, DocAddress, Index, IndexReader, IndexWriter, ReloadPolicy, Searcher,
    TantivyDocument, TantivyError, Term,
};
use tracing::{debug, info, instrument, warn};

pub use schema::{CODE_TOKENIZER, FieldKind, PLACE_FIELDS, PlaceFields};

const META_FILE: &str = "meta.json";
/// Tantivy's lower bound on a single indexing thread's memory budget.
const MIN_BUDGET_PER_THREAD: usize = 15_000_000;
const MAX_WRITER_THREADS: usize = 8;

/// Handle on a place index directory.
///
/// The reader is manually reloaded so a handle keeps answering from the
/// snapshot it was opened on until [`PlaceIndex::reload`] is called.
#[derive(Clone)]
pub struct PlaceIndex {
    path: PathBuf,
    index: Index,
    reader: IndexReader,
    fields: PlaceFields,
}

impl std::fmt::Debug for PlaceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaceIndex")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl PlaceIndex {
    /// True when `path` holds a committed index.
    pub fn exists(path: &Path) -> bool {
        path.join(META_FILE).exists()
    }

    /// Discard whatever is at `path` and create an empty index there.
    #[instrument(name = "Create place index", level = "info")]
    pub fn create(path: &Path) -> Result<Self> {
        if path.exists() {
            info!(path = ?path, "Removing existing index directory");
            std::fs::remove_dir_all(path)?;
        }
        std::fs::create_dir_all(path)?;
        let index = Index::create_in_dir(path, schema::build_schema())?;
        Self::from_index(path, index)
    }

    /// Open the index at `path` for a full rebuild, creating it when absent.
    ///
    /// An existing index is reused and the caller clears its documents
    /// through the writer. Only an index with a foreign schema is recreated.
    #[instrument(name = "Open or create place index", level = "debug")]
    pub fn open_or_create(path: &Path) -> Result<Self> {
        if Self::exists(path) {
            match Self::open(path) {
                Err(IndexError::MissingField(field)) => {
                    warn!(path = ?path, field, "Existing index has a different schema; recreating");
                }
                other => return other,
            }
        }
        Self::create(path)
    }

    /// Open an existing index, failing with `IndexNotFound` if none was
    /// ever committed at `path`.
    #[instrument(name = "Open place index", level = "debug")]
    pub fn open(path: &Path) -> Result<Self> {
        if !Self::exists(path) {
            return Err(IndexError::IndexNotFound(path.to_path_buf()));
        }
        let index = Index::open_in_dir(path)?;
        Self::from_index(path, index)
    }

    fn from_index(path: &Path, index: Index) -> Result<Self> {
        index
            .tokenizers()
            .register(CODE_TOKENIZER, schema::code_analyzer());
        let fields = PlaceFields::from_schema(&index.schema())?;
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;
        debug!(path = ?path, "Place index ready");
        Ok(Self {
            path: path.to_path_buf(),
            index,
            reader,
            fields,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub const fn fields(&self) -> &PlaceFields {
        &self.fields
    }

    pub const fn index(&self) -> &Index {
        &self.index
    }

    /// Current read snapshot.
    pub fn searcher(&self) -> Searcher {
        self.reader.searcher()
    }

    /// Move the read snapshot to the latest commit.
    pub fn reload(&self) -> Result<()> {
        Ok(self.reader.reload()?)
    }

    /// Live documents in the current snapshot.
    pub fn num_docs(&self) -> u64 {
        self.searcher().num_docs()
    }

    /// Acquire the single writer. Fails with `WriterLocked` while another
    /// writer holds the directory.
    ///
    /// The thread count is derived from the budget so that small budgets
    /// still satisfy Tantivy's per-thread minimum.
    pub(crate) fn writer(&self, memory_budget_bytes: usize) -> Result<IndexWriter> {
        let memory_budget_bytes = memory_budget_bytes.max(MIN_BUDGET_PER_THREAD);
        let cpus = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        let num_threads = (memory_budget_bytes / MIN_BUDGET_PER_THREAD)
            .min(cpus)
            .clamp(1, MAX_WRITER_THREADS);
        debug!(memory_budget_bytes, num_threads, "Acquiring index writer");
        self.index
            .writer_with_num_threads(num_threads, memory_budget_bytes)
            .map_err(|e| match e {
                TantivyError::LockFailure(..) => IndexError::WriterLocked(self.path.clone()),
                other => other.into(),
            })
    }

    /// Sequence number to give the next inserted document.
    pub(crate) fn next_seq(&self) -> Result<u64> {
        let searcher = self.searcher();
        let mut next = 0;
        for segment_reader in searcher.segment_readers() {
            if segment_reader.max_doc() == 0 {
                continue;
            }
            let column = segment_reader.fast_fields().u64(schema::SEQ_FIELD)?;
            next = next.max(column.max_value() + 1);
        }
        Ok(next)
    }

    /// Term for an exact match on a code field.
    pub fn code_term(field: tantivy::schema::Field, value: &str) -> Term {
        Term::from_field_text(field, &value.to_lowercase())
    }

    pub fn id_term(&self, id: &str) -> Term {
        Term::from_field_text(self.fields.id, id)
    }

    /// Every live document carrying `id`. More than one only happens after a
    /// non-deduplicating append.
    pub fn find_by_id(&self, id: &str) -> Result<Vec<PlaceRecord>> {
        let searcher = self.searcher();
        let query = TermQuery::new(self.id_term(id), IndexRecordOption::Basic);
        let count = searcher.search(&query, &Count)?;
        if count == 0 {
            return Ok(Vec::new());
        }
        searcher
            .search(&query, &TopDocs::with_limit(count))?
            .into_iter()
            .map(|(_, address)| self.load_record(&searcher, address))
            .collect()
    }

    pub fn load_record(&self, searcher: &Searcher, address: DocAddress) -> Result<PlaceRecord> {
        let doc = searcher.doc::<TantivyDocument>(address)?;
        Ok(self.record_from_document(&doc))
    }

    pub(crate) fn document(&self, record: &PlaceRecord, seq: u64) -> TantivyDocument {
        let f = &self.fields;
        let mut doc = TantivyDocument::default();
        doc.add_text(f.id, &record.id);
        doc.add_text(f.name, &record.name);
        doc.add_text(f.ascii_name, &record.ascii_name);
        doc.add_text(f.alternate_names, &record.alternate_names);
        doc.add_f64(f.latitude, record.latitude);
        doc.add_f64(f.longitude, record.longitude);
        doc.add_text(f.feature_class, &record.feature_class);
        doc.add_text(f.feature_code, &record.feature_code);
        doc.add_text(f.country_code, &record.country_code);
        doc.add_text(f.cc2, &record.cc2);
        for (field, code) in f.admin_codes.iter().zip(record.admin_codes()) {
            doc.add_text(*field, code);
        }
        for (field, value) in [
            (f.population, record.population),
            (f.elevation, record.elevation),
            (f.dem, record.dem),
        ] {
            if let Some(value) = value {
                doc.add_i64(field, value);
            }
        }
        doc.add_text(f.timezone, &record.timezone);
        if let Some(date) = record.modification_date {
            doc.add_date(f.modification_date, date_to_tantivy(date));
        }
        doc.add_u64(f.seq, seq);
        let name_keys = [&record.name, &record.ascii_name]
            .map(|text| schema::name_key(text))
            .into_iter()
            .filter(|key| !key.is_empty())
            .unique();
        for key in name_keys {
            doc.add_text(f.name_key, key);
        }
        doc
    }

    pub(crate) fn record_from_document(&self, doc: &TantivyDocument) -> PlaceRecord {
        let f = &self.fields;
        let text = |field| {
            doc.get_first(field)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_owned()
        };
        let float = |field| {
            doc.get_first(field)
                .and_then(|v| v.as_f64())
                .unwrap_or_default()
        };
        let int = |field| doc.get_first(field).and_then(|v| v.as_i64());
        let [admin1, admin2, admin3, admin4] = f.admin_codes;

        PlaceRecord {
            id: text(f.id),
            name: text(f.name),
            ascii_name: text(f.ascii_name),
            alternate_names: text(f.alternate_names),
            latitude: float(f.latitude),
            longitude: float(f.longitude),
            feature_class: text(f.feature_class),
            feature_code: text(f.feature_code),
            country_code: text(f.country_code),
            cc2: text(f.cc2),
            admin1_code: text(admin1),
            admin2_code: text(admin2),
            admin3_code: text(admin3),
            admin4_code: text(admin4),
            population: int(f.population),
            elevation: int(f.elevation),
            dem: int(f.dem),
            timezone: text(f.timezone),
            modification_date: doc
                .get_first(f.modification_date)
                .and_then(|v| v.as_datetime())
                .and_then(date_from_tantivy),
        }
    }
}

fn date_to_tantivy(date: NaiveDate) -> DateTime {
    DateTime::from_timestamp_secs(date.and_time(chrono::NaiveTime::MIN).and_utc().timestamp())
}

fn date_from_tantivy(value: DateTime) -> Option<NaiveDate> {
    chrono::DateTime::from_timestamp(value.into_timestamp_secs(), 0).map(|dt| dt.date_naive())
}

mod error {
    use std::path::PathBuf;

    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum IndexError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
        #[error("Tantivy error: {0}")]
        Tantivy(#[from] tantivy::TantivyError),
        #[error("No index found at {0}; build one first")]
        IndexNotFound(PathBuf),
        #[error("Index at {0} is already open for writing")]
        WriterLocked(PathBuf),
        #[error("Index schema is missing field '{0}'")]
        MissingField(&'static str),
        #[error("Data processing error: {0}")]
        Data(#[from] geosearch_data_processing::DataError),
        #[error(transparent)]
        Other(#[from] anyhow::Error),
    }

    impl IndexError {
        pub const fn is_malformed_record(&self) -> bool {
            matches!(self, Self::Data(e) if e.is_malformed_record())
        }
    }

    pub type Result<T> = std::result::Result<T, IndexError>;
}
