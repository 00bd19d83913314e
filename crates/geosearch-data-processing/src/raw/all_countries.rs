use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::Result;
use crate::DataError;

pub const FIELD_COUNT: usize = 19;

/// Column order of a GeoNames dump line.
pub const FIELD_NAMES: [&str; FIELD_COUNT] = [
    "id",
    "name",
    "ascii_name",
    "alternate_names",
    "latitude",
    "longitude",
    "feature_class",
    "feature_code",
    "country_code",
    "cc2",
    "admin1_code",
    "admin2_code",
    "admin3_code",
    "admin4_code",
    "population",
    "elevation",
    "dem",
    "timezone",
    "modification_date",
];

const DATE_FORMAT: &str = "%Y-%m-%d";

/// One gazetteer entry, as read from a dump line.
///
/// `admin1_code`..`admin4_code` are only meaningful together with
/// `country_code` and every lower-numbered admin code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlaceRecord {
    pub id: String,
    pub name: String,
    pub ascii_name: String,
    pub alternate_names: String,
    pub latitude: f64,
    pub longitude: f64,
    pub feature_class: String,
    pub feature_code: String,
    pub country_code: String,
    pub cc2: String,
    pub admin1_code: String,
    pub admin2_code: String,
    pub admin3_code: String,
    pub admin4_code: String,
    pub population: Option<i64>,
    pub elevation: Option<i64>,
    pub dem: Option<i64>,
    pub timezone: String,
    pub modification_date: Option<NaiveDate>,
}

impl PlaceRecord {
    /// Admin codes in level order (`admin1` first).
    pub fn admin_codes(&self) -> [&str; 4] {
        [
            &self.admin1_code,
            &self.admin2_code,
            &self.admin3_code,
            &self.admin4_code,
        ]
    }

    /// Render the record back into a dump line (without the newline).
    pub fn to_tsv_line(&self) -> String {
        let opt_int = |v: Option<i64>| v.map(|n| n.to_string()).unwrap_or_default();
        [
            self.id.clone(),
            self.name.clone(),
            self.ascii_name.clone(),
            self.alternate_names.clone(),
            self.latitude.to_string(),
            self.longitude.to_string(),
            self.feature_class.clone(),
            self.feature_code.clone(),
            self.country_code.clone(),
            self.cc2.clone(),
            self.admin1_code.clone(),
            self.admin2_code.clone(),
            self.admin3_code.clone(),
            self.admin4_code.clone(),
            opt_int(self.population),
            opt_int(self.elevation),
            opt_int(self.dem),
            self.timezone.clone(),
            self.modification_date
                .map(|d| d.format(DATE_FORMAT).to_string())
                .unwrap_or_default(),
        ]
        .join("\t")
    }
}

/// Parse a single dump line. `line_no` is 1-based and only used for errors.
///
/// The line must split into exactly [`FIELD_COUNT`] tab-separated fields;
/// nothing is padded or dropped.
pub fn parse_record_line(line: &str, line_no: u64) -> Result<PlaceRecord> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let line = line.strip_suffix('\r').unwrap_or(line);

    let fields: [&str; FIELD_COUNT] = line
        .split('\t')
        .collect::<Vec<_>>()
        .try_into()
        .map_err(|fields: Vec<&str>| DataError::FieldCount {
            line: line_no,
            expected: FIELD_COUNT,
            found: fields.len(),
        })?;

    let [
        id,
        name,
        ascii_name,
        alternate_names,
        latitude,
        longitude,
        feature_class,
        feature_code,
        country_code,
        cc2,
        admin1_code,
        admin2_code,
        admin3_code,
        admin4_code,
        population,
        elevation,
        dem,
        timezone,
        modification_date,
    ] = fields;

    Ok(PlaceRecord {
        id: id.to_owned(),
        name: name.to_owned(),
        ascii_name: ascii_name.to_owned(),
        alternate_names: alternate_names.to_owned(),
        latitude: parse_float("latitude", latitude, line_no)?,
        longitude: parse_float("longitude", longitude, line_no)?,
        feature_class: feature_class.to_owned(),
        feature_code: feature_code.to_owned(),
        country_code: country_code.to_owned(),
        cc2: cc2.to_owned(),
        admin1_code: admin1_code.to_owned(),
        admin2_code: admin2_code.to_owned(),
        admin3_code: admin3_code.to_owned(),
        admin4_code: admin4_code.to_owned(),
        population: parse_optional_int("population", population, line_no)?,
        elevation: parse_optional_int("elevation", elevation, line_no)?,
        dem: parse_optional_int("dem", dem, line_no)?,
        timezone: timezone.to_owned(),
        modification_date: parse_optional_date(modification_date, line_no)?,
    })
}

fn invalid(field: &'static str, value: &str, line: u64) -> DataError {
    DataError::InvalidField {
        line,
        field,
        value: value.to_owned(),
    }
}

fn parse_float(field: &'static str, value: &str, line: u64) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| invalid(field, value, line))
}

fn parse_optional_int(field: &'static str, value: &str, line: u64) -> Result<Option<i64>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<i64>()
        .map(Some)
        .map_err(|_| invalid(field, value, line))
}

/// Dates are read from the first ten characters (`YYYY-MM-DD`); anything
/// after that, such as a time component, is ignored.
fn parse_optional_date(value: &str, line: u64) -> Result<Option<NaiveDate>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let prefix = trimmed
        .get(..10)
        .ok_or_else(|| invalid("modification_date", value, line))?;
    NaiveDate::parse_from_str(prefix, DATE_FORMAT)
        .map(Some)
        .map_err(|_| invalid("modification_date", value, line))
}

/// Streaming reader over a dump, yielding one parsed record per line.
///
/// Only the current line is held in memory.
pub struct RecordReader<R> {
    lines: Lines<R>,
    line_no: u64,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }

    /// Number of lines consumed so far.
    pub const fn lines_read(&self) -> u64 {
        self.line_no
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = Result<PlaceRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = match self.lines.next()? {
            Ok(line) => line,
            Err(e) => return Some(Err(e.into())),
        };
        self.line_no += 1;
        Some(parse_record_line(&line, self.line_no))
    }
}

#[instrument(name = "Open GeoNames dump", level = "debug")]
pub fn open_records(path: &Path) -> Result<RecordReader<BufReader<File>>> {
    let file = File::open(path)?;
    debug!(path = ?path, "Opened record dump");
    Ok(RecordReader::new(BufReader::new(file)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_data::{SAN_FRANCISCO_LINE, record_line};

    #[test]
    fn test_parse_full_line() {
        let record = parse_record_line(SAN_FRANCISCO_LINE, 1).unwrap();

        assert_eq!(record.id, "5391959");
        assert_eq!(record.name, "San Francisco");
        assert_eq!(record.alternate_names, "SF,San Fran,Frisco");
        assert!((record.latitude - 37.77493).abs() < 1e-9);
        assert!((record.longitude + 122.41942).abs() < 1e-9);
        assert_eq!(record.feature_class, "P");
        assert_eq!(record.feature_code, "PPLA2");
        assert_eq!(record.admin_codes(), ["CA", "075", "", ""]);
        assert_eq!(record.population, Some(864816));
        assert_eq!(record.elevation, Some(16));
        assert_eq!(record.dem, Some(28));
        assert_eq!(record.timezone, "America/Los_Angeles");
        assert_eq!(
            record.modification_date,
            NaiveDate::from_ymd_opt(2022, 2, 24)
        );
    }

    #[test]
    fn test_empty_optionals_become_none() {
        let line = record_line(
            "42",
            "Nowhere",
            1.5,
            -2.5,
            ("S", "MNMT"),
            "XX",
            ["", "", "", ""],
        );
        let mut fields: Vec<&str> = line.split('\t').collect();
        fields[14] = "";
        fields[15] = "";
        fields[16] = "";
        fields[18] = "";
        let record = parse_record_line(&fields.join("\t"), 1).unwrap();

        assert_eq!(record.population, None);
        assert_eq!(record.elevation, None);
        assert_eq!(record.dem, None);
        assert_eq!(record.modification_date, None);
    }

    #[test]
    fn test_date_uses_first_ten_characters() {
        let line = SAN_FRANCISCO_LINE.replace("2022-02-24", "2022-02-24T10:00:00");
        let record = parse_record_line(&line, 1).unwrap();
        assert_eq!(
            record.modification_date,
            NaiveDate::from_ymd_opt(2022, 2, 24)
        );
    }

    #[test]
    fn test_trailing_newline_tolerated() {
        let line = format!("{SAN_FRANCISCO_LINE}\r\n");
        let record = parse_record_line(&line, 1).unwrap();
        assert_eq!(
            record.modification_date,
            NaiveDate::from_ymd_opt(2022, 2, 24)
        );
    }

    #[test]
    fn test_wrong_field_count_is_rejected() {
        let short = "1\tTest\tTest";
        let err = parse_record_line(short, 7).unwrap_err();
        assert!(matches!(
            err,
            DataError::FieldCount {
                line: 7,
                expected: FIELD_COUNT,
                found: 3
            }
        ));

        let long = format!("{SAN_FRANCISCO_LINE}\textra");
        let err = parse_record_line(&long, 8).unwrap_err();
        assert!(matches!(err, DataError::FieldCount { found: 20, .. }));
    }

    #[test]
    fn test_invalid_numbers_are_rejected() {
        let line = SAN_FRANCISCO_LINE.replace("37.77493", "north");
        let err = parse_record_line(&line, 2).unwrap_err();
        assert!(matches!(
            err,
            DataError::InvalidField {
                field: "latitude",
                ..
            }
        ));
        assert!(err.is_malformed_record());

        let line = SAN_FRANCISCO_LINE.replace("864816", "lots");
        let err = parse_record_line(&line, 2).unwrap_err();
        assert!(matches!(
            err,
            DataError::InvalidField {
                field: "population",
                ..
            }
        ));

        let line = SAN_FRANCISCO_LINE.replace("2022-02-24", "2022-02");
        let err = parse_record_line(&line, 2).unwrap_err();
        assert!(matches!(
            err,
            DataError::InvalidField {
                field: "modification_date",
                ..
            }
        ));
    }

    #[test]
    fn test_tsv_line_roundtrip_preserves_fields() {
        let record = parse_record_line(SAN_FRANCISCO_LINE, 1).unwrap();
        let reparsed = parse_record_line(&record.to_tsv_line(), 1).unwrap();
        assert_eq!(record, reparsed);
    }

    #[test]
    fn test_reader_counts_lines_and_stops_on_error() {
        let input = format!("{SAN_FRANCISCO_LINE}\nbroken line\n{SAN_FRANCISCO_LINE}\n");
        let mut reader = RecordReader::new(input.as_bytes());

        assert!(reader.next().unwrap().is_ok());
        let err = reader.next().unwrap().unwrap_err();
        assert!(matches!(err, DataError::FieldCount { line: 2, .. }));
        assert_eq!(reader.lines_read(), 2);
        assert!(reader.next().unwrap().is_ok());
        assert!(reader.next().is_none());
    }
}
