//! Building and extending an index
//!
//! Usage: `cargo run --example build_index -- [DATA_DIR] [DUMP...]`
//!
//! With no dump files a generated sample is indexed instead. The first dump
//! replaces whatever index `DATA_DIR` held; pass several to append the rest.

use std::path::PathBuf;
use std::time::Instant;

use geosearch::data_processing::test_data::{TestDataConfig, create_test_data};
use geosearch::{BuildOptions, GeoSearch, SearchConfig};
use indicatif::{ProgressBar, ProgressStyle};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = geosearch::init_logging(tracing::Level::INFO);

    let mut args = std::env::args().skip(1);
    let data_dir = args.next().map_or_else(
        || std::env::temp_dir().join("geosearch_example"),
        PathBuf::from,
    );
    let mut sources: Vec<PathBuf> = args.map(PathBuf::from).collect();

    // keep the generated sample alive until the build is done
    let sample = if sources.is_empty() {
        let (dump, _codes) = create_test_data(&TestDataConfig::sample())?;
        sources.push(dump.path().to_path_buf());
        Some(dump)
    } else {
        None
    };

    let progress = ProgressBar::new_spinner();
    progress.set_style(ProgressStyle::with_template(
        "{spinner} {pos} records indexed [{elapsed}]",
    )?);

    let start = Instant::now();
    let report =
        GeoSearch::build_sources(&data_dir, &sources, &BuildOptions::default(), &progress)?;
    drop(sample);

    println!(
        "Indexed {} records from {} file(s) in {:?}",
        report.records(),
        report.indexed.len(),
        start.elapsed()
    );
    for skipped in &report.skipped {
        println!("  skipped {}: {}", skipped.path.display(), skipped.reason);
    }

    let engine = GeoSearch::open(&data_dir)?;
    println!("Index holds {} documents", engine.index().num_docs());
    for result in engine.find("Paris", &SearchConfig::default())? {
        println!("  {result}");
    }

    Ok(())
}
