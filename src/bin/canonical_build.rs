use std::path::PathBuf;

use ail_canonical::{
    init_logging, load_inputs_from_dir, load_population_counts, log_build_start,
    log_inputs_selected, log_output_written, log_station_summaries, logging_config_from_env,
    run_pipeline,
    station_regions, write_canonical_csv, CanadianHolidays, PipelineConfig, RegionWeightTable,
    POPULATION_FILE,
};
use chrono::Datelike;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_cfg = logging_config_from_env();
    init_logging(&logging_cfg)?;
    log_build_start(&logging_cfg);

    let input_dir = PathBuf::from(
        std::env::var("AIL_INPUT_DIR").unwrap_or_else(|_| "data/raw".to_string()),
    );
    let output_path = PathBuf::from(
        std::env::var("AIL_OUTPUT_PATH")
            .unwrap_or_else(|_| "data/canonical/ail_hourly.csv".to_string()),
    );
    let config_path = std::env::var("AIL_PIPELINE_CONFIG").ok().map(PathBuf::from);
    let config = match &config_path {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    log_inputs_selected(&input_dir, config_path.as_deref(), &config);

    let inputs = load_inputs_from_dir(&input_dir)?;
    let counts = load_population_counts(&input_dir.join(POPULATION_FILE))?;
    let shares =
        RegionWeightTable::from_counts(&counts, &station_regions(), config.grid_start.year())?;
    shares.validate(config.share_tolerance)?;

    let output = run_pipeline(&inputs, &config, &CanadianHolidays, &shares)?;
    log_station_summaries(&output.report);
    write_canonical_csv(&output_path, &output.schema, &output.records)?;
    log_output_written(&output_path, output.records.len(), &output.schema.fingerprint);

    println!(
        "Wrote {} rows x {} columns to {} (schema v{} {})",
        output.records.len(),
        output.schema.columns.len(),
        output_path.display(),
        output.schema.version,
        output.schema.fingerprint
    );
    for station in &output.report.stations {
        println!(
            "  {:<14} isolated={} contiguous={} outliers={} unresolved={}",
            station.station.code(),
            station.isolated_gaps,
            station.contiguous_gaps,
            station.outliers.screened.len(),
            station.backfill.unresolved_total
        );
    }

    Ok(())
}
