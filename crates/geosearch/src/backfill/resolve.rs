//! Level-by-level hierarchy walk.
//!
//! At level N the containing division is the single ADM<N> record sharing the
//! place's country code and admin codes 1..=N. The walk stops at the first
//! level whose code is empty or whose containing record is missing or not
//! unique; deeper levels are never attached past a gap.
use geosearch_data_processing::PlaceRecord;
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::{Searcher, Term};
use tracing::{instrument, trace};

use super::{AdminHierarchy, AdminSummary, Result};
use crate::index::PlaceIndex;

/// Deepest administrative level.
pub const ADMIN_LEVELS: usize = 4;

/// Outcome of looking up the division containing a place at one level.
#[derive(Debug, Clone, PartialEq)]
pub enum Containment {
    Unique(PlaceRecord),
    Missing,
    /// More than one candidate; carries how many.
    Ambiguous(usize),
}

/// Attach the containing divisions of `record`, outermost first.
///
/// Issues at most [`ADMIN_LEVELS`] lookups against `searcher`.
#[instrument(name = "Resolve hierarchy", skip_all, fields(id = record.id.as_str()), level = "debug")]
pub fn resolve_hierarchy(
    index: &PlaceIndex,
    searcher: &Searcher,
    record: &PlaceRecord,
) -> Result<AdminHierarchy> {
    let mut hierarchy = AdminHierarchy::default();
    if record.country_code.is_empty() {
        trace!("No country code; nothing to resolve");
        return Ok(hierarchy);
    }

    let codes = record.admin_codes();
    for level in 1..=ADMIN_LEVELS {
        let code = codes[level - 1];
        if code.is_empty() {
            trace!(level, "No admin code; stopping");
            break;
        }
        match containment(index, searcher, record, level)? {
            Containment::Unique(parent) => {
                trace!(level, parent = parent.id.as_str(), "Containing division found");
                hierarchy.set(level, AdminSummary::from(parent));
            }
            Containment::Missing => {
                trace!(level, code, "No containing division; stopping");
                break;
            }
            Containment::Ambiguous(candidates) => {
                trace!(level, code, candidates, "Ambiguous containing division; stopping");
                break;
            }
        }
    }
    Ok(hierarchy)
}

/// Look up the ADM<`level`> record containing `record`.
pub fn containment(
    index: &PlaceIndex,
    searcher: &Searcher,
    record: &PlaceRecord,
    level: usize,
) -> Result<Containment> {
    let fields = index.fields();
    let exact = |term: Term| -> (Occur, Box<dyn Query>) {
        (
            Occur::Must,
            Box::new(TermQuery::new(term, IndexRecordOption::Basic)),
        )
    };

    let mut clauses = vec![
        exact(PlaceIndex::code_term(
            fields.country_code,
            &record.country_code,
        )),
        exact(PlaceIndex::code_term(
            fields.feature_code,
            &format!("ADM{level}"),
        )),
    ];
    clauses.extend(
        fields
            .admin_codes
            .iter()
            .zip(record.admin_codes())
            .take(level)
            .map(|(field, code)| exact(PlaceIndex::code_term(*field, code))),
    );

    let (top_docs, count) = searcher.search(
        &BooleanQuery::new(clauses),
        &(TopDocs::with_limit(1), Count),
    )?;
    Ok(match (count, top_docs.first()) {
        (1, Some((_, address))) => Containment::Unique(index.load_record(searcher, *address)?),
        (0, _) | (_, None) => Containment::Missing,
        (n, _) => Containment::Ambiguous(n),
    })
}
