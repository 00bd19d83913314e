//! Field layout of the place index.
//!
//! Every column of a [`PlaceRecord`](crate::PlaceRecord) is stored. Names are
//! tokenized full-text; administrative and classification codes are indexed
//! whole and lowercased so they can be matched exactly; coordinates are
//! numeric and range-queryable. A hidden `seq` fast field records insertion
//! order for stable tie-breaking, and a hidden `name_key` fast field holds the
//! normalized `name` and `ascii_name` so whole-name matches can be spotted
//! at collection time.
use itertools::Itertools;
use tantivy::schema::{
    FAST, Field, INDEXED, IndexRecordOption, NumericOptions, STORED, STRING, Schema,
    SchemaBuilder, TextFieldIndexing, TextOptions,
};
use tantivy::tokenizer::{LowerCaser, RawTokenizer, TextAnalyzer};

use super::{IndexError, Result};

/// Tokenizer name for exact, case-insensitive code matching.
pub const CODE_TOKENIZER: &str = "geosearch_code";
/// Tokenizer for names: lowercase, split on non-alphanumeric characters.
pub const TEXT_TOKENIZER: &str = "default";
pub const SEQ_FIELD: &str = "seq";
pub const NAME_KEY_FIELD: &str = "name_key";

/// How a record column is represented in the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Unique external identifier, matched verbatim.
    Id,
    /// Tokenized, searchable text.
    Text,
    /// Searchable as a single lowercased token.
    Code,
    /// Stored only.
    Stored,
    /// Stored, indexed and fast `f64`.
    Float,
    /// Stored `i64`, may be absent.
    Integer,
    /// Stored date, may be absent.
    Date,
}

impl FieldKind {
    pub const fn is_searchable(self) -> bool {
        matches!(self, Self::Id | Self::Text | Self::Code | Self::Float)
    }
}

/// Column name and kind, in dump order.
pub const PLACE_FIELDS: [(&str, FieldKind); 19] = [
    ("id", FieldKind::Id),
    ("name", FieldKind::Text),
    ("ascii_name", FieldKind::Text),
    ("alternate_names", FieldKind::Text),
    ("latitude", FieldKind::Float),
    ("longitude", FieldKind::Float),
    ("feature_class", FieldKind::Stored),
    ("feature_code", FieldKind::Code),
    ("country_code", FieldKind::Code),
    ("cc2", FieldKind::Code),
    ("admin1_code", FieldKind::Code),
    ("admin2_code", FieldKind::Code),
    ("admin3_code", FieldKind::Code),
    ("admin4_code", FieldKind::Code),
    ("population", FieldKind::Integer),
    ("elevation", FieldKind::Integer),
    ("dem", FieldKind::Integer),
    ("timezone", FieldKind::Stored),
    ("modification_date", FieldKind::Date),
];

pub fn build_schema() -> Schema {
    let mut schema_builder = SchemaBuilder::new();

    let text_options = TextOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(TEXT_TOKENIZER)
                .set_index_option(IndexRecordOption::WithFreqsAndPositions),
        )
        .set_stored();
    let code_options = TextOptions::default()
        .set_indexing_options(
            TextFieldIndexing::default()
                .set_tokenizer(CODE_TOKENIZER)
                .set_index_option(IndexRecordOption::Basic),
        )
        .set_stored();

    for (name, kind) in PLACE_FIELDS {
        match kind {
            FieldKind::Id => {
                schema_builder.add_text_field(name, STRING | STORED);
            }
            FieldKind::Text => {
                schema_builder.add_text_field(name, text_options.clone());
            }
            FieldKind::Code => {
                schema_builder.add_text_field(name, code_options.clone());
            }
            FieldKind::Stored => {
                schema_builder.add_text_field(name, STORED);
            }
            FieldKind::Float => {
                schema_builder.add_f64_field(name, STORED | INDEXED | FAST);
            }
            FieldKind::Integer => {
                schema_builder.add_i64_field(name, NumericOptions::default().set_stored());
            }
            FieldKind::Date => {
                schema_builder.add_date_field(name, STORED);
            }
        }
    }
    schema_builder.add_u64_field(SEQ_FIELD, FAST);
    schema_builder.add_text_field(NAME_KEY_FIELD, STRING | FAST);
    schema_builder.build()
}

/// Lowercased alphanumeric runs of `text`, joined by single spaces.
///
/// `"  Île-de-France "` and `"île de FRANCE"` share the key `"île de france"`.
pub fn name_key(text: &str) -> String {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_lowercase)
        .join(" ")
}

/// Analyzer registered under [`CODE_TOKENIZER`].
pub fn code_analyzer() -> TextAnalyzer {
    TextAnalyzer::builder(RawTokenizer::default())
        .filter(LowerCaser)
        .build()
}

/// Resolved field handles for the place schema.
#[derive(Debug, Clone, Copy)]
pub struct PlaceFields {
    pub id: Field,
    pub name: Field,
    pub ascii_name: Field,
    pub alternate_names: Field,
    pub latitude: Field,
    pub longitude: Field,
    pub feature_class: Field,
    pub feature_code: Field,
    pub country_code: Field,
    pub cc2: Field,
    pub admin_codes: [Field; 4],
    pub population: Field,
    pub elevation: Field,
    pub dem: Field,
    pub timezone: Field,
    pub modification_date: Field,
    pub seq: Field,
    pub name_key: Field,
}

impl PlaceFields {
    /// Look up every field; fails if the schema is not a place schema.
    pub fn from_schema(schema: &Schema) -> Result<Self> {
        let get = |name: &'static str| {
            schema
                .get_field(name)
                .map_err(|_| IndexError::MissingField(name))
        };
        Ok(Self {
            id: get("id")?,
            name: get("name")?,
            ascii_name: get("ascii_name")?,
            alternate_names: get("alternate_names")?,
            latitude: get("latitude")?,
            longitude: get("longitude")?,
            feature_class: get("feature_class")?,
            feature_code: get("feature_code")?,
            country_code: get("country_code")?,
            cc2: get("cc2")?,
            admin_codes: [
                get("admin1_code")?,
                get("admin2_code")?,
                get("admin3_code")?,
                get("admin4_code")?,
            ],
            population: get("population")?,
            elevation: get("elevation")?,
            dem: get("dem")?,
            timezone: get("timezone")?,
            modification_date: get("modification_date")?,
            seq: get(SEQ_FIELD)?,
            name_key: get(NAME_KEY_FIELD)?,
        })
    }

    /// Fields consulted by free-text name search.
    pub const fn name_fields(&self) -> [Field; 3] {
        [self.name, self.ascii_name, self.alternate_names]
    }
}
