//! Tiered name search.
//!
//! The query is tokenized the same way names are indexed, then run against
//! `name`, `ascii_name` and `alternate_names` in up to three tiers: exact
//! terms, terms within edit distance 1, terms within edit distance 2. Every
//! query term has to match (in any of the three fields). The first tier with
//! a hit wins; scores from different tiers are never mixed.
//!
//! Within a tier, a record whose whole `name` or `ascii_name` equals the
//! query comes before any other hit, then higher scores, then earlier
//! insertion.
use std::cmp::Reverse;

use ahash::AHashMap;
use itertools::Itertools;
use levenshtein_automata::{DFA, Distance, LevenshteinAutomatonBuilder, SINK_STATE};
use once_cell::sync::Lazy;
use rapidfuzz::distance::levenshtein;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, BoostQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption};
use tantivy::tokenizer::{Token, TokenStream};
use tantivy::{DocId, Score, Searcher, SegmentReader, Term};
use tantivy_fst::Automaton;
use tracing::{debug, instrument, trace};

use super::{Result, ScoredRecord, SearchError};
use crate::index::PlaceIndex;
use crate::index::schema::{NAME_KEY_FIELD, SEQ_FIELD, name_key};

/// Largest edit distance the fuzzy tiers support.
pub const MAX_FUZZY_DISTANCE: u8 = 2;

/// Boosts for `name`, `ascii_name` and `alternate_names`, in that order.
const NAME_FIELD_BOOSTS: [f32; 3] = [2.0, 2.0, 1.0];

/// Levenshtein automaton builders for distances 1 and 2, without
/// transpositions.
static DFA_BUILDERS: Lazy<[LevenshteinAutomatonBuilder; 2]> = Lazy::new(|| {
    [
        LevenshteinAutomatonBuilder::new(1, false),
        LevenshteinAutomatonBuilder::new(2, false),
    ]
});

/// The tier that produced a set of hits.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MatchTier {
    Exact,
    SingleFuzzy,
    DoubleFuzzy,
}

impl MatchTier {
    const ALL: [Self; 3] = [Self::Exact, Self::SingleFuzzy, Self::DoubleFuzzy];

    /// Edit distance tolerated by this tier.
    pub const fn distance(self) -> u8 {
        match self {
            Self::Exact => 0,
            Self::SingleFuzzy => 1,
            Self::DoubleFuzzy => 2,
        }
    }

    /// Tiers to attempt, in order, for a maximum distance.
    fn up_to(max_distance: u8) -> impl Iterator<Item = Self> {
        Self::ALL
            .into_iter()
            .filter(move |tier| tier.distance() <= max_distance)
    }
}

/// Hits of a name search and the tier that found them. `tier` is `None`
/// when nothing matched.
#[derive(Debug, Clone, Default)]
pub struct TextMatches {
    pub tier: Option<MatchTier>,
    pub hits: Vec<ScoredRecord>,
}

/// Search place names on the index's current snapshot.
///
/// See [`search_text_in`].
pub fn search_text(
    index: &PlaceIndex,
    query: &str,
    limit: usize,
    max_fuzzy_distance: u8,
) -> Result<TextMatches> {
    search_text_in(index, &index.searcher(), query, limit, max_fuzzy_distance)
}

/// Search place names in `searcher`'s snapshot, falling back through the
/// fuzzy tiers up to `max_fuzzy_distance`.
///
/// A distance above [`MAX_FUZZY_DISTANCE`] is rejected before the index is
/// touched. `limit` may exceed the number of documents; it is capped there.
#[instrument(name = "Text search", skip(index, searcher), level = "debug")]
pub fn search_text_in(
    index: &PlaceIndex,
    searcher: &Searcher,
    query: &str,
    limit: usize,
    max_fuzzy_distance: u8,
) -> Result<TextMatches> {
    if max_fuzzy_distance > MAX_FUZZY_DISTANCE {
        return Err(SearchError::InvalidArgument(format!(
            "max_fuzzy_distance must be at most {MAX_FUZZY_DISTANCE}, got {max_fuzzy_distance}"
        )));
    }
    let limit = limit.min(usize::try_from(searcher.num_docs()).unwrap_or(usize::MAX));
    if limit == 0 {
        return Ok(TextMatches::default());
    }

    let terms = query_terms(index, query)?;
    if terms.is_empty() {
        debug!("Query has no searchable terms");
        return Ok(TextMatches::default());
    }
    let query_key = name_key(query);

    for tier in MatchTier::up_to(max_fuzzy_distance) {
        let hits = run_tier(index, searcher, &terms, &query_key, tier, limit)?;
        if !hits.is_empty() {
            return Ok(TextMatches {
                tier: Some(tier),
                hits,
            });
        }
    }
    debug!("No tier matched");
    Ok(TextMatches::default())
}

/// Tokenize a query with the analyzer used for indexed names. Repeated
/// terms are dropped.
pub fn query_terms(index: &PlaceIndex, query: &str) -> Result<Vec<String>> {
    let mut analyzer = index
        .index()
        .tokenizer_for_field(index.fields().name)?;
    let mut terms = Vec::new();
    analyzer
        .token_stream(query)
        .process(&mut |token: &Token| terms.push(token.text.clone()));
    Ok(terms.into_iter().unique().collect())
}

#[instrument(name = "Match tier", skip(index, searcher, terms, query_key), level = "debug")]
fn run_tier(
    index: &PlaceIndex,
    searcher: &Searcher,
    terms: &[String],
    query_key: &str,
    tier: MatchTier,
    limit: usize,
) -> Result<Vec<ScoredRecord>> {
    let t_tier = std::time::Instant::now();
    let Some(query) = tier_query(index, searcher, terms, tier.distance())? else {
        debug!("No indexed terms within reach");
        return Ok(Vec::new());
    };

    let query_key = query_key.to_owned();
    let collector = TopDocs::with_limit(limit).tweak_score(move |segment_reader: &SegmentReader| {
        let fast_fields = segment_reader.fast_fields();
        let seq_column = fast_fields.u64(SEQ_FIELD).ok();
        let name_keys = fast_fields.str(NAME_KEY_FIELD).ok().flatten();
        let key_ord = name_keys.as_ref().and_then(|column| {
            column
                .dictionary()
                .term_ord(query_key.as_bytes())
                .ok()
                .flatten()
        });
        move |doc: DocId, score: Score| {
            let whole_name = match (&name_keys, key_ord) {
                (Some(column), Some(ord)) => {
                    column.ords().values_for_doc(doc).any(|value| value == ord)
                }
                _ => false,
            };
            let seq = seq_column
                .as_ref()
                .and_then(|column| column.first(doc))
                .unwrap_or(u64::MAX);
            (whole_name, score, Reverse(seq))
        }
    });
    let top_docs = searcher.search(&query, &collector)?;

    let hits = top_docs
        .into_iter()
        .map(|((_, score, _), address)| {
            Ok(ScoredRecord {
                score,
                record: index.load_record(searcher, address)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    debug!(
        hits = hits.len(),
        elapsed_seconds = t_tier.elapsed().as_secs_f32(),
        "Tier complete"
    );
    Ok(hits)
}

/// AND over query terms, each an OR over the name fields and, for fuzzy
/// tiers, over every indexed variant within `distance`. Variants further
/// from the query term weigh less. `None` when some term has no variant at
/// all, since the conjunction cannot match.
fn tier_query(
    index: &PlaceIndex,
    searcher: &Searcher,
    terms: &[String],
    distance: u8,
) -> Result<Option<BooleanQuery>> {
    let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::with_capacity(terms.len());
    for term in terms {
        let mut alternatives: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        for (field, field_boost) in index.fields().name_fields().into_iter().zip(NAME_FIELD_BOOSTS) {
            let variants: Vec<(String, usize)> = if distance == 0 {
                vec![(term.clone(), 0)]
            } else {
                expand_term(searcher, field, term, distance)?
                    .into_iter()
                    .sorted()
                    .collect()
            };
            alternatives.extend(variants.into_iter().map(|(variant, edits)| {
                let query = TermQuery::new(
                    Term::from_field_text(field, &variant),
                    IndexRecordOption::WithFreqs,
                );
                let boost = field_boost / (1 + edits) as f32;
                let query: Box<dyn Query> = Box::new(BoostQuery::new(Box::new(query), boost));
                (Occur::Should, query)
            }));
        }
        if alternatives.is_empty() {
            trace!(term = term.as_str(), distance, "Term has no variants");
            return Ok(None);
        }
        trace!(
            term = term.as_str(),
            variants = alternatives.len(),
            "Term expanded"
        );
        clauses.push((Occur::Must, Box::new(BooleanQuery::new(alternatives))));
    }
    Ok(Some(BooleanQuery::new(clauses)))
}

/// Levenshtein DFA over the bytes of dictionary terms.
struct LevenshteinDfa(DFA);

impl Automaton for LevenshteinDfa {
    type State = u32;

    fn start(&self) -> u32 {
        self.0.initial_state()
    }

    fn is_match(&self, state: &u32) -> bool {
        matches!(self.0.distance(*state), Distance::Exact(_))
    }

    fn can_match(&self, state: &u32) -> bool {
        *state != SINK_STATE
    }

    fn accept(&self, state: &u32, byte: u8) -> u32 {
        self.0.transition(*state, byte)
    }
}

/// Indexed terms of `field` within `distance` edits of `term` that share its
/// first character, with their edit distance.
///
/// The term dictionary is walked through a Levenshtein automaton starting at
/// the first character, so only terms the automaton can still accept are
/// visited.
fn expand_term(
    searcher: &Searcher,
    field: Field,
    term: &str,
    distance: u8,
) -> Result<AHashMap<String, usize>> {
    let mut variants = AHashMap::new();
    let Some(first) = term.chars().next() else {
        return Ok(variants);
    };
    let Some(builder) = DFA_BUILDERS.get(usize::from(distance).wrapping_sub(1)) else {
        return Ok(variants);
    };
    let mut prefix_buf = [0_u8; 4];
    let prefix = first.encode_utf8(&mut prefix_buf).as_bytes();
    let max_edits = usize::from(distance);
    let dfa = LevenshteinDfa(builder.build_dfa(term));
    let cutoff = levenshtein::Args::default().score_cutoff(max_edits);

    for segment_reader in searcher.segment_readers() {
        let inverted_index = segment_reader.inverted_index(field)?;
        let mut stream = inverted_index.terms().search(&dfa).ge(prefix).into_stream()?;
        while stream.advance() {
            let key = stream.key();
            if !key.starts_with(prefix) {
                break;
            }
            let Ok(candidate) = std::str::from_utf8(key) else {
                continue;
            };
            if variants.contains_key(candidate) {
                continue;
            }
            if let Some(edits) =
                levenshtein::distance_with_args(term.chars(), candidate.chars(), &cutoff)
            {
                variants.insert(candidate.to_owned(), edits);
            }
        }
    }
    Ok(variants)
}
