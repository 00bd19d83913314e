//! Bulk indexing of GeoNames dumps.
//!
//! Records are streamed from the dump one line at a time and committed in
//! batches, so a reader only ever sees whole batches and an interrupted build
//! keeps everything up to its last commit. A malformed line aborts the file
//! being indexed; [`build_sources`] decides whether to move on to the next.
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use geosearch_data_processing::RecordReader;
use tantivy::indexer::NoMergePolicy;
use tantivy::{IndexWriter, TantivyDocument};
use tracing::{debug, info, instrument, warn};

use crate::config::{BuildMode, BuildOptions, DuplicatePolicy};
use crate::index::{IndexError, PlaceIndex};

type Result<T> = std::result::Result<T, IndexError>;

/// How often the progress sink is told about processed records.
const PROGRESS_INTERVAL: u64 = 10_000;

/// Receives the running count of processed records during a build.
pub trait ProgressSink {
    fn on_progress(&self, records_processed: u64);

    fn on_finish(&self, _records_processed: u64) {}
}

impl ProgressSink for () {
    fn on_progress(&self, _records_processed: u64) {}
}

impl<F: Fn(u64)> ProgressSink for F {
    fn on_progress(&self, records_processed: u64) {
        self(records_processed);
    }
}

#[cfg(feature = "progress")]
impl ProgressSink for indicatif::ProgressBar {
    fn on_progress(&self, records_processed: u64) {
        self.set_position(records_processed);
    }

    fn on_finish(&self, records_processed: u64) {
        self.finish_with_message(format!("Indexed {records_processed} records"));
    }
}

/// Result of indexing one record stream.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    /// The freshly committed index, reloaded onto the final commit.
    pub index: PlaceIndex,
    pub records: u64,
    pub commits: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedSource {
    pub path: PathBuf,
    pub records: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSource {
    pub path: PathBuf,
    pub reason: String,
}

/// What [`build_sources`] did with each input file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourcesReport {
    pub indexed: Vec<IndexedSource>,
    pub skipped: Vec<SkippedSource>,
}

impl SourcesReport {
    pub fn records(&self) -> u64 {
        self.indexed.iter().map(|s| s.records).sum()
    }
}

/// Index every record read from `reader` into the index at `dir`.
///
/// Under [`BuildMode::Replace`] every existing document is dropped in the
/// first commit; under [`BuildMode::Append`] the index must already exist.
/// Either way the build fails with `WriterLocked` while another writer holds
/// the directory. The first malformed line aborts the call, leaving the
/// batches committed before it in place.
#[instrument(name = "Build index", skip(reader, options, progress), level = "info")]
pub fn build_index<R, P>(
    dir: &Path,
    reader: R,
    options: &BuildOptions,
    progress: &P,
) -> Result<BuildOutcome>
where
    R: BufRead,
    P: ProgressSink + ?Sized,
{
    let index = match options.mode {
        BuildMode::Replace => PlaceIndex::open_or_create(dir)?,
        BuildMode::Append => PlaceIndex::open(dir)?,
    };
    let duplicate_policy = options.duplicate_policy();
    let compact = options.compacts();
    let batch_size = options.batch_size.max(1) as u64;
    info!(
        mode = ?options.mode,
        ?duplicate_policy,
        compact,
        batch_size,
        "Starting index build"
    );
    let t_build = std::time::Instant::now();

    // Nothing is deleted before the lock is held.
    let writer = index.writer(options.writer_memory_bytes)?;
    // Segments are only merged explicitly, right after a commit.
    writer.set_merge_policy(Box::new(NoMergePolicy));
    let next_seq = match options.mode {
        BuildMode::Replace => {
            // Readers keep the previous content until the first commit.
            writer.delete_all_documents()?;
            0
        }
        BuildMode::Append => index.next_seq()?,
    };

    let mut batch = Batch {
        index: &index,
        writer,
        duplicate_policy,
        compact,
        next_seq,
        pending: 0,
        commits: 0,
    };

    let mut records = 0_u64;
    for record in RecordReader::new(reader) {
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                batch.abandon();
                return Err(e.into());
            }
        };
        if let Err(e) = batch.add(&record) {
            batch.abandon();
            return Err(e);
        }
        records += 1;

        if batch.pending >= batch_size {
            batch.commit()?;
            progress.on_progress(records);
        } else if records % PROGRESS_INTERVAL == 0 {
            progress.on_progress(records);
        }
    }

    if batch.pending > 0 || batch.commits == 0 {
        batch.commit()?;
    }
    let commits = batch.commits;
    batch.writer.wait_merging_threads()?;
    index.reload()?;
    progress.on_finish(records);

    info!(
        records,
        commits,
        num_docs = index.num_docs(),
        elapsed_seconds = t_build.elapsed().as_secs_f32(),
        "Index build complete"
    );
    Ok(BuildOutcome {
        index,
        records,
        commits,
    })
}

/// [`build_index`] over a dump file.
pub fn build_file<P>(
    dir: &Path,
    path: &Path,
    options: &BuildOptions,
    progress: &P,
) -> Result<BuildOutcome>
where
    P: ProgressSink + ?Sized,
{
    let file = File::open(path)?;
    info!(source = ?path, "Indexing dump file");
    build_index(dir, BufReader::new(file), options, progress)
}

/// Index several dump files into one index.
///
/// The first file that indexes cleanly applies `options.mode`; later files
/// extend that index with the same duplicate and compaction policies. A file
/// containing a malformed record is skipped with a warning; any other error
/// aborts the whole run.
#[instrument(name = "Build index from sources", skip(paths, options, progress), level = "info")]
pub fn build_sources<S, P>(
    dir: &Path,
    paths: &[S],
    options: &BuildOptions,
    progress: &P,
) -> Result<SourcesReport>
where
    S: AsRef<Path>,
    P: ProgressSink + ?Sized,
{
    let mut report = SourcesReport::default();
    let continuing = options.continuing();

    for path in paths {
        let path = path.as_ref();
        let file_options = if report.indexed.is_empty() {
            options
        } else {
            &continuing
        };
        match build_file(dir, path, file_options, progress) {
            Ok(outcome) => report.indexed.push(IndexedSource {
                path: path.to_path_buf(),
                records: outcome.records,
            }),
            Err(e) if e.is_malformed_record() => {
                warn!(source = ?path, error = %e, "Skipping source with malformed record");
                report.skipped.push(SkippedSource {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        indexed = report.indexed.len(),
        skipped = report.skipped.len(),
        records = report.records(),
        "All sources processed"
    );
    Ok(report)
}

/// The open write transaction of a build.
struct Batch<'a> {
    index: &'a PlaceIndex,
    writer: IndexWriter,
    duplicate_policy: DuplicatePolicy,
    compact: bool,
    next_seq: u64,
    pending: u64,
    commits: u64,
}

impl Batch<'_> {
    fn add(&mut self, record: &geosearch_data_processing::PlaceRecord) -> Result<()> {
        if self.duplicate_policy == DuplicatePolicy::Upsert {
            self.writer.delete_term(self.index.id_term(&record.id));
        }
        let doc: TantivyDocument = self.index.document(record, self.next_seq);
        self.writer.add_document(doc)?;
        self.next_seq += 1;
        self.pending += 1;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        let opstamp = self.writer.commit()?;
        self.commits += 1;
        debug!(
            opstamp,
            records = self.pending,
            commit = self.commits,
            "Batch committed"
        );
        self.pending = 0;

        if self.compact {
            let segment_ids = self.index.index().searchable_segment_ids()?;
            if segment_ids.len() > 1 {
                debug!(segments = segment_ids.len(), "Compacting segments");
                self.writer.merge(&segment_ids).wait()?;
            }
        }
        Ok(())
    }

    /// Drop everything added since the last commit.
    fn abandon(&mut self) {
        if self.pending == 0 {
            return;
        }
        warn!(
            discarded = self.pending,
            "Discarding uncommitted records after failure"
        );
        if let Err(e) = self.writer.rollback() {
            warn!(error = %e, "Rollback failed; uncommitted records are dropped with the writer");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BuildOptionsBuilder;
    use geosearch_data_processing::test_data::{
        SAN_FRANCISCO_LINE, TestDataConfig, create_test_data, filler_line, sample_lines,
        write_lines,
    };
    use std::cell::RefCell;
    use tempfile::TempDir;

    fn small_options() -> BuildOptionsBuilder {
        BuildOptions::builder().writer_memory_bytes(15_000_000)
    }

    fn lines_reader(lines: &[String]) -> std::io::Cursor<String> {
        std::io::Cursor::new(lines.join("\n"))
    }

    #[test]
    fn test_replace_build_yields_every_record_once() {
        let dir = TempDir::new().unwrap();
        let (dump, _codes) = create_test_data(&TestDataConfig::sample()).unwrap();
        let options = small_options().batch_size(100).build().unwrap();

        let outcome = build_file(dir.path(), dump.path(), &options, &()).unwrap();

        let expected = sample_lines().len() as u64 + 250;
        assert_eq!(outcome.records, expected);
        assert_eq!(outcome.commits, 3);
        assert_eq!(outcome.index.num_docs(), expected);
        assert_eq!(outcome.index.find_by_id("5391959").unwrap().len(), 1);
        assert_eq!(
            outcome.index.index().searchable_segment_ids().unwrap().len(),
            1,
            "replace builds compact after each commit"
        );
    }

    #[test]
    fn test_upsert_keeps_last_write() {
        let dir = TempDir::new().unwrap();
        let renamed = SAN_FRANCISCO_LINE.replace(
            "\tSan Francisco\tSan Francisco\t",
            "\tYerba Buena\tYerba Buena\t",
        );
        let lines = vec![SAN_FRANCISCO_LINE.to_owned(), renamed];
        let options = small_options().build().unwrap();

        let outcome = build_index(dir.path(), lines_reader(&lines), &options, &()).unwrap();

        let records = outcome.index.find_by_id("5391959").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "Yerba Buena");
    }

    #[test]
    fn test_append_adds_duplicates() {
        let dir = TempDir::new().unwrap();
        let lines = sample_lines();
        let replace = small_options().build().unwrap();
        build_index(dir.path(), lines_reader(&lines), &replace, &()).unwrap();

        let append = small_options().mode(BuildMode::Append).build().unwrap();
        let outcome = build_index(dir.path(), lines_reader(&lines), &append, &()).unwrap();

        assert_eq!(outcome.index.num_docs(), 2 * lines.len() as u64);
        assert_eq!(outcome.index.find_by_id("2988507").unwrap().len(), 2);
    }

    #[test]
    fn test_append_with_upsert_override() {
        let dir = TempDir::new().unwrap();
        let lines = sample_lines();
        let replace = small_options().build().unwrap();
        build_index(dir.path(), lines_reader(&lines), &replace, &()).unwrap();

        let append = small_options()
            .mode(BuildMode::Append)
            .duplicate_policy(DuplicatePolicy::Upsert)
            .build()
            .unwrap();
        let outcome = build_index(dir.path(), lines_reader(&lines), &append, &()).unwrap();

        assert_eq!(outcome.index.num_docs(), lines.len() as u64);
    }

    #[test]
    fn test_append_requires_existing_index() {
        let dir = TempDir::new().unwrap();
        let options = small_options().mode(BuildMode::Append).build().unwrap();
        let err = build_index(
            &dir.path().join("indexdir"),
            lines_reader(&sample_lines()),
            &options,
            &(),
        )
        .unwrap_err();
        assert!(matches!(err, IndexError::IndexNotFound(_)));
    }

    #[test]
    fn test_malformed_line_keeps_committed_batches() {
        let dir = TempDir::new().unwrap();
        let mut lines: Vec<String> = (0..5).map(filler_line).collect();
        lines.push("broken\tline".to_owned());
        lines.push(filler_line(99));
        let options = small_options().batch_size(2).build().unwrap();

        let err = build_index(dir.path(), lines_reader(&lines), &options, &()).unwrap_err();
        assert!(err.is_malformed_record());

        let index = PlaceIndex::open(dir.path()).unwrap();
        assert_eq!(index.num_docs(), 4, "the fifth record was never committed");
    }

    #[test]
    fn test_empty_input_still_commits() {
        let dir = TempDir::new().unwrap();
        let options = small_options().build().unwrap();
        let outcome = build_index(dir.path(), std::io::Cursor::new(""), &options, &()).unwrap();
        assert_eq!(outcome.records, 0);
        assert_eq!(outcome.commits, 1);
        assert!(PlaceIndex::exists(dir.path()));
    }

    #[test]
    fn test_progress_reports_final_batch() {
        let dir = TempDir::new().unwrap();
        let lines: Vec<String> = (0..7).map(filler_line).collect();
        let options = small_options().batch_size(3).build().unwrap();
        let seen = RefCell::new(Vec::new());

        build_index(dir.path(), lines_reader(&lines), &options, &|n: u64| {
            seen.borrow_mut().push(n);
        })
        .unwrap();

        assert_eq!(*seen.borrow(), vec![3, 6]);
    }

    #[test]
    fn test_second_build_while_writer_held() {
        let dir = TempDir::new().unwrap();
        let options = small_options().build().unwrap();
        let outcome = build_index(dir.path(), lines_reader(&sample_lines()), &options, &()).unwrap();
        let _writer = outcome.index.writer(15_000_000).unwrap();

        let append = small_options().mode(BuildMode::Append).build().unwrap();
        let err = build_index(dir.path(), lines_reader(&sample_lines()), &append, &()).unwrap_err();
        assert!(matches!(err, IndexError::WriterLocked(_)));
    }

    #[test]
    fn test_replace_respects_the_writer_lock() {
        let dir = TempDir::new().unwrap();
        let options = small_options().build().unwrap();
        let lines = sample_lines();
        let outcome = build_index(dir.path(), lines_reader(&lines), &options, &()).unwrap();
        let writer = outcome.index.writer(15_000_000).unwrap();

        let replacement: Vec<String> = (0..3).map(filler_line).collect();
        let err =
            build_index(dir.path(), lines_reader(&replacement), &options, &()).unwrap_err();
        assert!(matches!(err, IndexError::WriterLocked(_)));

        // the held writer's index is untouched
        drop(writer);
        let index = PlaceIndex::open(dir.path()).unwrap();
        assert_eq!(index.num_docs(), lines.len() as u64);
    }

    #[test]
    fn test_replace_swaps_content_on_commit() {
        let dir = TempDir::new().unwrap();
        let options = small_options().build().unwrap();
        let first = build_index(dir.path(), lines_reader(&sample_lines()), &options, &()).unwrap();

        let replacement: Vec<String> = (0..3).map(filler_line).collect();
        let second = build_index(dir.path(), lines_reader(&replacement), &options, &()).unwrap();

        assert_eq!(second.index.num_docs(), 3);
        assert!(second.index.find_by_id("5391959").unwrap().is_empty());
        // a reader opened before the rebuild keeps its snapshot until reloaded
        assert_eq!(first.index.num_docs(), sample_lines().len() as u64);
        first.index.reload().unwrap();
        assert_eq!(first.index.num_docs(), 3);
    }

    #[test]
    fn test_append_leaves_segments_uncompacted() {
        let dir = TempDir::new().unwrap();
        let replace = small_options().build().unwrap();
        let outcome = build_index(dir.path(), lines_reader(&sample_lines()), &replace, &()).unwrap();
        assert_eq!(outcome.index.index().searchable_segment_ids().unwrap().len(), 1);

        let lines: Vec<String> = (0..6).map(filler_line).collect();
        let append = small_options()
            .mode(BuildMode::Append)
            .batch_size(2)
            .build()
            .unwrap();
        let outcome = build_index(dir.path(), lines_reader(&lines), &append, &()).unwrap();

        assert_eq!(outcome.commits, 3);
        assert!(outcome.index.index().searchable_segment_ids().unwrap().len() > 1);
        assert_eq!(outcome.index.num_docs(), sample_lines().len() as u64 + 6);
    }

    #[test]
    fn test_default_batch_size() {
        assert_eq!(crate::config::DEFAULT_BATCH_SIZE, 1_000_000);
        assert_eq!(BuildOptions::default().batch_size, 1_000_000);
    }

    #[test]
    fn test_sources_skip_malformed_files() {
        let dir = TempDir::new().unwrap();
        let good = write_lines(&sample_lines()).unwrap();
        let broken = write_lines(&[filler_line(1), "short\tline".to_owned()]).unwrap();
        let extra = write_lines(&[filler_line(2), filler_line(3)]).unwrap();
        let options = small_options().build().unwrap();

        let report = build_sources(
            dir.path(),
            &[broken.path(), good.path(), extra.path()],
            &options,
            &(),
        )
        .unwrap();

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].path, broken.path());
        assert_eq!(report.indexed.len(), 2);
        assert_eq!(report.records(), sample_lines().len() as u64 + 2);

        let index = PlaceIndex::open(dir.path()).unwrap();
        assert_eq!(index.num_docs(), report.records());
    }

    #[test]
    fn test_sources_abort_on_missing_file() {
        let dir = TempDir::new().unwrap();
        let good = write_lines(&sample_lines()).unwrap();
        let missing = dir.path().join("missing.txt");
        let options = small_options().build().unwrap();

        let err = build_sources(
            &dir.path().join("indexdir"),
            &[good.path(), missing.as_path()],
            &options,
            &(),
        )
        .unwrap_err();
        assert!(matches!(err, IndexError::Io(_)));
    }
}
