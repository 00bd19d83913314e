//! Small GeoNames-shaped fixtures shared by the unit and integration tests.
//!
//! The sample covers a country, admin divisions at levels 1 and 2, places
//! whose hierarchy is complete, partial or ambiguous, and a marker at
//! (10.0, 20.0) for bounding-box checks.
use std::io::Write;

use tempfile::NamedTempFile;
use tracing::info;

use super::error::Result;
use crate::raw::{FIELD_COUNT, FeatureCodeTable};

pub const SAN_FRANCISCO_LINE: &str = "5391959\tSan Francisco\tSan Francisco\tSF,San Fran,Frisco\t37.77493\t-122.41942\tP\tPPLA2\tUS\t\tCA\t075\t\t\t864816\t16\t28\tAmerica/Los_Angeles\t2022-02-24";

#[rustfmt::skip]
const SAMPLE_ROWS: [[&str; FIELD_COUNT]; 15] = [
    ["6252001", "United States", "United States", "US,USA,America,Estados Unidos", "39.76", "-98.5", "A", "PCLI", "US", "", "00", "", "", "", "327167434", "", "537", "America/Chicago", "2019-09-05"],
    ["5332921", "California", "California", "CA,Calif,Californie", "37.25022", "-119.75126", "A", "ADM1", "US", "", "CA", "", "", "", "37691912", "", "218", "America/Los_Angeles", "2022-04-26"],
    ["5391997", "City and County of San Francisco", "City and County of San Francisco", "", "37.7558", "-122.4449", "A", "ADM2", "US", "", "CA", "075", "", "", "864816", "", "48", "America/Los_Angeles", "2021-07-07"],
    ["5368361", "Los Angeles", "Los Angeles", "LA,Lungsod ng Los Angeles", "34.05223", "-118.24368", "P", "PPLA2", "US", "", "CA", "037", "", "", "3971883", "89", "115", "America/Los_Angeles", "2023-01-01"],
    ["5400229", "Lake Tahoe", "Lake Tahoe", "Tahoe", "39.09689", "-120.03276", "H", "LK", "US", "", "CA", "", "", "", "", "1897", "1898", "America/Los_Angeles", "2019-05-22"],
    ["3017382", "France", "France", "FR,Frankreich", "46.0", "2.0", "A", "PCLI", "FR", "", "00", "", "", "", "66987244", "", "543", "Europe/Paris", "2021-12-03"],
    ["3012874", "Île-de-France", "Ile-de-France", "IDF,Region Ile-de-France", "48.5", "2.5", "A", "ADM1", "FR", "", "11", "", "", "", "12213447", "", "99", "Europe/Paris", "2022-01-01"],
    ["2968815", "Département de Paris", "Departement de Paris", "", "48.8534", "2.3486", "A", "ADM2", "FR", "", "11", "75", "", "", "2138551", "", "42", "Europe/Paris", "2021-01-01"],
    ["2988507", "Paris", "Paris", "Lutece,Paname,Ville Lumiere", "48.85341", "2.3488", "P", "PPLC", "FR", "", "11", "75", "751", "75056", "2138551", "", "42", "Europe/Paris", "2023-02-08"],
    ["3177401", "Emilia-Romagna", "Emilia-Romagna", "Emilia Romagna", "44.5", "11.0", "A", "ADM1", "IT", "", "45", "", "", "", "4446354", "", "53", "Europe/Rome", "2022-03-01"],
    ["3171457", "Parma", "Parma", "Parme", "44.79935", "10.32618", "P", "PPLA2", "IT", "", "45", "PR", "034027", "", "175895", "55", "57", "Europe/Rome", "2021-06-01"],
    ["9000001", "Bbox Marker", "Bbox Marker", "", "10.0", "20.0", "S", "MNMT", "TD", "", "", "", "", "", "", "", "", "Africa/Ndjamena", ""],
    ["9100001", "Springfield Region North", "Springfield Region North", "", "40.0", "-89.0", "A", "ADM1", "ZZ", "", "01", "", "", "", "", "", "", "UTC", "2020-01-01"],
    ["9100002", "Springfield Region South", "Springfield Region South", "", "39.0", "-89.0", "A", "ADM1", "ZZ", "", "01", "", "", "", "", "", "", "UTC", "2020-01-01"],
    ["9100003", "Springfield", "Springfield", "", "39.8", "-89.6", "P", "PPL", "ZZ", "", "01", "", "", "", "114394", "", "", "UTC", "2020-01-01"],
];

/// JSON form of [`sample_feature_codes`]. Class `S` is deliberately absent.
pub const SAMPLE_FEATURE_CODES_JSON: &str = r#"{
    "A": {
        "descr": "country, state, region,...",
        "codes": {
            "ADM1": {"short": "first-order administrative division", "full": "a primary administrative division of a country, such as a state in the United States"},
            "ADM2": {"short": "second-order administrative division", "full": "a subdivision of a first-order administrative division"},
            "PCLI": {"short": "independent political entity", "full": ""}
        }
    },
    "H": {
        "descr": "stream, lake, ...",
        "codes": {
            "LK": {"short": "lake", "full": "a large inland body of standing water"}
        }
    },
    "P": {
        "descr": "city, village,...",
        "codes": {
            "PPL": {"short": "populated place", "full": "a city, town, village, or other agglomeration of buildings where people live and work"},
            "PPLA2": {"short": "seat of a second-order administrative division", "full": ""},
            "PPLC": {"short": "capital of a political entity", "full": ""}
        }
    }
}"#;

/// Configuration for test data generation
#[derive(Debug, Clone, Default)]
pub struct TestDataConfig {
    /// Generated `Filler N` rows appended after the sample
    pub filler_rows: usize,
    /// Append a line with too few fields at the very end
    pub trailing_malformed_line: bool,
}

impl TestDataConfig {
    /// The hand-written sample only
    pub fn minimal() -> Self {
        Self::default()
    }

    /// Sample plus enough filler to span several commit batches in tests
    pub fn sample() -> Self {
        Self {
            filler_rows: 250,
            trailing_malformed_line: false,
        }
    }
}

/// A complete dump line with plausible defaults for the fields tests rarely
/// care about.
pub fn record_line(
    id: &str,
    name: &str,
    latitude: f64,
    longitude: f64,
    (feature_class, feature_code): (&str, &str),
    country_code: &str,
    admin_codes: [&str; 4],
) -> String {
    let latitude = latitude.to_string();
    let longitude = longitude.to_string();
    let [admin1, admin2, admin3, admin4] = admin_codes;
    [
        id,
        name,
        name,
        "",
        latitude.as_str(),
        longitude.as_str(),
        feature_class,
        feature_code,
        country_code,
        "",
        admin1,
        admin2,
        admin3,
        admin4,
        "1000",
        "10",
        "10",
        "UTC",
        "2024-01-01",
    ]
    .join("\t")
}

/// Every sample line, in insertion order.
pub fn sample_lines() -> Vec<String> {
    let mut lines: Vec<String> = SAMPLE_ROWS.iter().map(|row| row.join("\t")).collect();
    // keep San Francisco right after its county
    lines.insert(3, SAN_FRANCISCO_LINE.to_owned());
    lines
}

pub fn sample_feature_codes() -> FeatureCodeTable {
    let mut table = FeatureCodeTable::new();
    table.insert_code(
        "A",
        "ADM1",
        "first-order administrative division",
        "a primary administrative division of a country, such as a state in the United States",
    );
    table.insert_code(
        "A",
        "ADM2",
        "second-order administrative division",
        "a subdivision of a first-order administrative division",
    );
    table.insert_code("A", "PCLI", "independent political entity", "");
    table.insert_code("H", "LK", "lake", "a large inland body of standing water");
    table.insert_code(
        "P",
        "PPL",
        "populated place",
        "a city, town, village, or other agglomeration of buildings where people live and work",
    );
    table.insert_code(
        "P",
        "PPLA2",
        "seat of a second-order administrative division",
        "",
    );
    table.insert_code("P", "PPLC", "capital of a political entity", "");
    table
}

pub fn filler_line(i: usize) -> String {
    record_line(
        &format!("8{i:06}"),
        &format!("Filler {i}"),
        -60.0 + (i % 120) as f64,
        -170.0 + (i % 340) as f64,
        ("P", "PPL"),
        "XF",
        ["", "", "", ""],
    )
}

/// Write lines to a temporary dump file, one record per line.
pub fn write_lines<S: AsRef<str>>(lines: &[S]) -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    for line in lines {
        writeln!(file, "{}", line.as_ref())?;
    }
    file.flush()?;
    Ok(file)
}

/// Create test data files in temporary files: the record dump and the
/// feature-code JSON table.
pub fn create_test_data(config: &TestDataConfig) -> Result<(NamedTempFile, NamedTempFile)> {
    info!("Creating test data with config: {:?}", config);

    let mut lines = sample_lines();
    lines.extend((0..config.filler_rows).map(filler_line));
    if config.trailing_malformed_line {
        lines.push("not_a_record\tonly three\tfields".to_owned());
    }
    let all_countries = write_lines(&lines)?;

    let mut feature_codes = NamedTempFile::new()?;
    feature_codes.write_all(SAMPLE_FEATURE_CODES_JSON.as_bytes())?;
    feature_codes.flush()?;

    Ok((all_countries, feature_codes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::{open_records, parse_record_line};

    #[test]
    fn test_sample_lines_all_parse() {
        let lines = sample_lines();
        assert_eq!(lines.len(), SAMPLE_ROWS.len() + 1);
        for (i, line) in lines.iter().enumerate() {
            let parsed = parse_record_line(line, i as u64 + 1);
            assert!(parsed.is_ok(), "Sample line {} should parse: {parsed:?}", i + 1);
        }
    }

    #[test]
    fn test_record_line_shape() {
        let line = record_line("1", "Alpha", 1.0, 2.0, ("P", "PPL"), "XX", ["01", "", "", ""]);
        let record = parse_record_line(&line, 1).unwrap();
        assert_eq!(record.name, "Alpha");
        assert_eq!(record.ascii_name, "Alpha");
        assert_eq!(record.admin1_code, "01");
        assert_eq!(record.population, Some(1000));
    }

    #[test]
    fn test_create_test_data_files() {
        let config = TestDataConfig {
            filler_rows: 5,
            trailing_malformed_line: true,
        };
        let (dump, codes) = create_test_data(&config).unwrap();

        let results: Vec<_> = open_records(dump.path()).unwrap().collect();
        assert_eq!(results.len(), sample_lines().len() + 6);
        assert!(results[..results.len() - 1].iter().all(Result::is_ok));
        assert!(results.last().unwrap().is_err());

        let table = FeatureCodeTable::load(codes.path()).unwrap();
        assert_eq!(table, sample_feature_codes());
    }
}
