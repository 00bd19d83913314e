//! Basic gazetteer search
//!
//! This example demonstrates the three query kinds against a small sample
//! index built into a temporary data directory:
//! - Name search with typo tolerance
//! - Position search around a coordinate
//! - Lookup by GeoNames id

use std::path::Path;

use geosearch::data_processing::feature_codes_path;
use geosearch::data_processing::test_data::{
    SAMPLE_FEATURE_CODES_JSON, TestDataConfig, create_test_data,
};
use geosearch::{BuildOptions, GeoSearch, SearchConfig, SearchConfigBuilder, SearchResult};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let data_dir = tempfile::TempDir::new()?;
    prepare_sample(data_dir.path())?;

    let engine = GeoSearch::open(data_dir.path())?;

    println!("Searching for 'San Francisco':");
    let results = engine.find("San Francisco", &SearchConfig::default())?;
    print_search_results(&results, 3);

    // A typo still lands through the fuzzy tiers
    println!("\nSearching for 'Pariss':");
    let detailed = engine.find_detailed("Pariss", &SearchConfig::default())?;
    println!("  answered by tier {:?}", detailed.tier);
    print_search_results(&detailed.results, 3);

    println!("\nFast search for 'Tahoe' (no hierarchy):");
    let config = SearchConfigBuilder::fast().limit(2).build();
    print_search_results(&engine.find("Tahoe", &config)?, 2);

    println!("\nPlaces around Notre-Dame:");
    let nearby = engine.find_position(48.8534, 2.3487, &SearchConfig::default())?;
    print_search_results(&nearby, 5);

    println!("\nLookup by id 3171457:");
    for place in engine.get("3171457")? {
        println!("  {place}");
    }

    Ok(())
}

fn prepare_sample(data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let (dump, _codes) = create_test_data(&TestDataConfig::minimal())?;
    std::fs::write(feature_codes_path(data_dir), SAMPLE_FEATURE_CODES_JSON)?;
    let options = BuildOptions::builder()
        .writer_memory_bytes(15_000_000)
        .build()?;
    GeoSearch::build(data_dir, dump.path(), &options, &())?;
    Ok(())
}

fn print_search_results(results: &[SearchResult], limit: usize) {
    for (i, result) in results.iter().take(limit).enumerate() {
        let place = &result.place;
        println!(
            "  {}. {} - Score: {:.3}, Feature: {}",
            i + 1,
            place,
            result.score,
            place
                .feature_code_short
                .as_deref()
                .filter(|s| !s.is_empty())
                .unwrap_or(&place.record.feature_code)
        );
    }

    if results.len() > limit {
        println!("  ... and {} more results", results.len() - limit);
    }
}
