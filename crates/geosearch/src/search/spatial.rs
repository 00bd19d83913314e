//! Bounding-box search over stored coordinates.
//!
//! A square of side `2 * half_width` degrees around the centre, as two
//! independent range filters. Hits are ordered by planar distance to the
//! centre, then by insertion order, and scored `1 / (1 + distance)`.
use std::cmp::Reverse;
use std::ops::Bound;

use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, RangeQuery};
use tantivy::schema::Field;
use tantivy::{DocId, Searcher, SegmentReader, Term};
use tracing::{debug, instrument};

use super::{Result, ScoredRecord, SearchError};
use crate::index::PlaceIndex;
use crate::index::schema::SEQ_FIELD;

/// Places inside the box around a position on the index's current
/// snapshot. See [`search_bbox_in`].
pub fn search_bbox(
    index: &PlaceIndex,
    latitude: f64,
    longitude: f64,
    limit: usize,
    half_width: f64,
) -> Result<Vec<ScoredRecord>> {
    search_bbox_in(index, &index.searcher(), latitude, longitude, limit, half_width)
}

/// Places inside the box around a position in `searcher`'s snapshot,
/// nearest first. `limit` is capped at the number of documents.
#[instrument(name = "Bounding box search", skip(index, searcher), level = "debug")]
pub fn search_bbox_in(
    index: &PlaceIndex,
    searcher: &Searcher,
    latitude: f64,
    longitude: f64,
    limit: usize,
    half_width: f64,
) -> Result<Vec<ScoredRecord>> {
    if !half_width.is_finite() || half_width < 0.0 {
        return Err(SearchError::InvalidArgument(format!(
            "half_width must be a finite, non-negative number of degrees, got {half_width}"
        )));
    }
    if !latitude.is_finite() || !longitude.is_finite() {
        return Err(SearchError::InvalidArgument(format!(
            "centre must be finite, got ({latitude}, {longitude})"
        )));
    }
    let limit = limit.min(usize::try_from(searcher.num_docs()).unwrap_or(usize::MAX));
    if limit == 0 {
        return Ok(Vec::new());
    }

    let fields = index.fields();
    let query = BooleanQuery::new(vec![
        (Occur::Must, axis_range(fields.latitude, latitude, half_width)),
        (Occur::Must, axis_range(fields.longitude, longitude, half_width)),
    ]);

    let collector = TopDocs::with_limit(limit).custom_score(move |segment_reader: &SegmentReader| {
        let fast_fields = segment_reader.fast_fields();
        let latitudes = fast_fields.f64("latitude").ok();
        let longitudes = fast_fields.f64("longitude").ok();
        let seqs = fast_fields.u64(SEQ_FIELD).ok();
        move |doc: DocId| {
            let position = latitudes
                .as_ref()
                .and_then(|c| c.first(doc))
                .zip(longitudes.as_ref().and_then(|c| c.first(doc)));
            let distance = position.map_or(f64::INFINITY, |(lat, lon)| {
                (lat - latitude).hypot(lon - longitude)
            });
            let seq = seqs
                .as_ref()
                .and_then(|c| c.first(doc))
                .unwrap_or(u64::MAX);
            (-distance, Reverse(seq))
        }
    });

    let top_docs = searcher.search(&query, &collector)?;
    let hits = top_docs
        .into_iter()
        .map(|((neg_distance, _), address)| {
            Ok(ScoredRecord {
                score: (1.0 / (1.0 - neg_distance)) as f32,
                record: index.load_record(searcher, address)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    debug!(hits = hits.len(), "Bounding box search complete");
    Ok(hits)
}

fn axis_range(field: Field, centre: f64, half_width: f64) -> Box<dyn Query> {
    Box::new(RangeQuery::new(
        Bound::Included(Term::from_field_f64(field, centre - half_width)),
        Bound::Included(Term::from_field_f64(field, centre + half_width)),
    ))
}
