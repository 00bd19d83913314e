//! Readers for the raw GeoNames inputs: the `allCountries`-style record dump
//! and the feature class/code description table.

pub(super) mod all_countries;
pub(super) mod feature_codes;

pub use super::error::Result;
pub use all_countries::{
    FIELD_COUNT, FIELD_NAMES, PlaceRecord, RecordReader, open_records, parse_record_line,
};
pub use feature_codes::{FeatureClass, FeatureCode, FeatureCodeTable, FeatureDescription};
