use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::Result;

/// Class descriptions as published on the GeoNames feature-code page.
/// `featureCodes_en.txt` only carries per-code descriptions.
const CLASS_DESCRIPTIONS: [(&str, &str); 9] = [
    ("A", "country, state, region,..."),
    ("H", "stream, lake, ..."),
    ("L", "parks,area, ..."),
    ("P", "city, village,..."),
    ("R", "road, railroad"),
    ("S", "spot, building, farm"),
    ("T", "mountain,hill,rock,..."),
    ("U", "undersea"),
    ("V", "forest,heath,..."),
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureCode {
    #[serde(default)]
    pub short: String,
    #[serde(default)]
    pub full: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureClass {
    #[serde(default)]
    pub descr: Option<String>,
    #[serde(default)]
    pub codes: BTreeMap<String, FeatureCode>,
}

/// Human-readable descriptions for one class/code pair.
///
/// A class missing from the table leaves `class_descr` empty; a missing code
/// leaves both code descriptions as empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeatureDescription {
    pub class_descr: Option<String>,
    pub code_short: String,
    pub code_full: String,
}

/// Feature class -> {description, code -> {short, full}}.
///
/// Serialized as the JSON object `{"A": {"descr": ..., "codes": {...}}, ...}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureCodeTable {
    classes: BTreeMap<String, FeatureClass>,
}

impl FeatureCodeTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[instrument(name = "Load feature codes", level = "debug")]
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let table = Self::from_json_str(&content)?;
        debug!(classes = table.classes.len(), "Feature code table loaded");
        Ok(table)
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Build a table from GeoNames' `featureCodes_en.txt`
    /// (`A.ADM1<TAB>short<TAB>full`). Lines without a `class.code` key, such
    /// as the trailing `null` row, are skipped.
    pub fn from_feature_codes_tsv<R: BufRead>(reader: R) -> Result<Self> {
        let mut table = Self::new();
        for line in reader.lines() {
            let line = line?;
            let mut parts = line.splitn(3, '\t');
            let key = parts.next().unwrap_or_default().trim();
            let Some((class, code)) = key.split_once('.') else {
                continue;
            };
            let short = parts.next().unwrap_or_default().trim();
            let full = parts.next().unwrap_or_default().trim();
            table.insert_code(class, code, short, full);
        }
        debug!(
            classes = table.classes.len(),
            "Feature code table built from TSV"
        );
        Ok(table)
    }

    /// Add or replace a code. A newly seen class picks up its standard
    /// GeoNames description when there is one.
    pub fn insert_code(&mut self, class: &str, code: &str, short: &str, full: &str) {
        let entry = self
            .classes
            .entry(class.to_owned())
            .or_insert_with(|| FeatureClass {
                descr: CLASS_DESCRIPTIONS
                    .iter()
                    .find(|(c, _)| *c == class)
                    .map(|(_, d)| (*d).to_owned()),
                codes: BTreeMap::new(),
            });
        entry.codes.insert(
            code.to_owned(),
            FeatureCode {
                short: short.to_owned(),
                full: full.to_owned(),
            },
        );
    }

    pub fn set_class_description(&mut self, class: &str, descr: Option<String>) {
        self.classes.entry(class.to_owned()).or_default().descr = descr;
    }

    pub fn class(&self, class: &str) -> Option<&FeatureClass> {
        self.classes.get(class)
    }

    pub fn lookup(&self, class: &str, code: &str) -> FeatureDescription {
        let Some(fclass) = self.classes.get(class) else {
            return FeatureDescription::default();
        };
        let fcode = fclass.codes.get(code);
        FeatureDescription {
            class_descr: fclass.descr.clone(),
            code_short: fcode.map(|c| c.short.clone()).unwrap_or_default(),
            code_full: fcode.map(|c| c.full.clone()).unwrap_or_default(),
        }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_data::{SAMPLE_FEATURE_CODES_JSON, sample_feature_codes};

    #[test]
    fn test_lookup_known_and_missing() {
        let table = sample_feature_codes();

        let adm1 = table.lookup("A", "ADM1");
        assert_eq!(
            adm1.class_descr.as_deref(),
            Some("country, state, region,...")
        );
        assert_eq!(adm1.code_short, "first-order administrative division");
        assert!(adm1.code_full.starts_with("a primary administrative division"));

        let missing_code = table.lookup("A", "NOPE");
        assert!(missing_code.class_descr.is_some());
        assert_eq!(missing_code.code_short, "");
        assert_eq!(missing_code.code_full, "");

        let missing_class = table.lookup("Q", "ADM1");
        assert_eq!(missing_class, FeatureDescription::default());
    }

    #[test]
    fn test_json_shape() {
        let table = FeatureCodeTable::from_json_str(SAMPLE_FEATURE_CODES_JSON).unwrap();
        assert_eq!(table, sample_feature_codes());

        let value: serde_json::Value = serde_json::to_value(&table).unwrap();
        assert_eq!(value["P"]["codes"]["PPLC"]["short"], "capital of a political entity");
        assert_eq!(value["H"]["descr"], "stream, lake, ...");
    }

    #[test]
    fn test_null_class_description_is_accepted() {
        let json = r#"{"X": {"descr": null, "codes": {"ABC": {"short": "s", "full": "f"}}}}"#;
        let table = FeatureCodeTable::from_json_str(json).unwrap();
        let descr = table.lookup("X", "ABC");
        assert_eq!(descr.class_descr, None);
        assert_eq!(descr.code_short, "s");
    }

    #[test]
    fn test_from_feature_codes_tsv() {
        let tsv = "A.ADM1\tfirst-order administrative division\ta primary administrative division of a country, such as a state in the United States\n\
                   P.PPL\tpopulated place\ta city, town, village, or other agglomeration of buildings where people live and work\n\
                   null\t\t\n";
        let table = FeatureCodeTable::from_feature_codes_tsv(tsv.as_bytes()).unwrap();

        assert_eq!(table.len(), 2);
        let ppl = table.lookup("P", "PPL");
        assert_eq!(ppl.class_descr.as_deref(), Some("city, village,..."));
        assert_eq!(ppl.code_short, "populated place");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("placecodes.json");
        let table = sample_feature_codes();

        table.save(&path).unwrap();
        let loaded = FeatureCodeTable::load(&path).unwrap();
        assert_eq!(loaded, table);
    }
}
