use anyhow::{anyhow, Context};
use clap::Parser;
use envchange_gis::{
    geofile::export::{write_features_to_geofiles, ExportFormat, ExportOptions},
    normalize::{
        normalizer::{import_shapefile, FeatureNormalizer, ImportReport},
        records::records_from_json,
    },
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::{fs, fs::read_to_string};

/// Convert shapefiles or analysis records into GeoJSON and KML.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input config file.
    #[arg(short, long)]
    config_filepath: String,
}

#[derive(Deserialize, Debug, PartialEq)]
enum InputConfig {
    Shapefile {
        shp_path: PathBuf,
        dbf_path: Option<PathBuf>,
    },
    Records {
        filepath: PathBuf,
    },
}

#[derive(Deserialize, Debug, PartialEq)]
struct Config {
    input: InputConfig,
    output_dir: PathBuf,
    export_name: String,
    #[serde(default = "default_formats")]
    formats: Vec<ExportFormat>,
    #[serde(flatten)]
    export_options: ExportOptions,
}

fn default_formats() -> Vec<ExportFormat> {
    ExportFormat::ALL.to_vec()
}

/// The `.dbf` next to `shp_path`, if there is one.
fn sibling_dbf(shp_path: &Path) -> Option<PathBuf> {
    let dbf_path = shp_path.with_extension("dbf");
    dbf_path.exists().then_some(dbf_path)
}

fn load_features(
    input: &InputConfig,
    normalizer: &FeatureNormalizer,
) -> anyhow::Result<ImportReport> {
    match input {
        InputConfig::Shapefile { shp_path, dbf_path } => {
            let shp = fs::read(shp_path).with_context(|| format!("Reading {:?}", shp_path))?;
            let dbf_path = dbf_path.clone().or_else(|| sibling_dbf(shp_path));
            let dbf = match &dbf_path {
                Some(dbf_path) => {
                    log::info!("Reading attributes from {:?}", dbf_path);
                    Some(fs::read(dbf_path).with_context(|| format!("Reading {:?}", dbf_path))?)
                }
                None => {
                    log::warn!("No attribute table found for {:?}", shp_path);
                    None
                }
            };
            import_shapefile(&shp, dbf.as_deref(), normalizer).map_err(|failure| {
                log::error!(
                    "Discarding {} features decoded before the failure",
                    failure.partial.accepted_count()
                );
                anyhow!(failure)
            })
        }
        InputConfig::Records { filepath } => {
            let contents =
                read_to_string(filepath).with_context(|| format!("Reading {:?}", filepath))?;
            let records = records_from_json(&contents)
                .with_context(|| format!("Parsing analysis records in {:?}", filepath))?;
            log::info!("Read {} analysis records", records.len());
            Ok(normalizer.from_records(records))
        }
    }
}

fn try_main() -> anyhow::Result<()> {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    env_logger::init();

    let args = Args::try_parse()?;
    if !Path::new(&args.config_filepath).exists() {
        return Err(anyhow!("Config file {} not found", &args.config_filepath));
    }
    let config_contents = read_to_string(args.config_filepath)?;
    let config: Config = serde_yaml::from_str(&config_contents)?;

    let normalizer = FeatureNormalizer::default();
    let report = load_features(&config.input, &normalizer)?;
    log::info!("Accepted {} features", report.accepted_count());
    if let Some(bounds) = report.bounds {
        log::info!("{:?} centered at {:?}", bounds, bounds.center());
    }
    for skipped in &report.skipped {
        log::info!("Skipped record {}: {}", skipped.index, skipped.reason);
    }

    let written = write_features_to_geofiles(
        &report.features,
        &config.output_dir,
        &config.export_name,
        &config.formats,
        &config.export_options,
    )?;
    log::info!("Wrote {} files", written.len());
    Ok(())
}

fn main() {
    if let Err(e) = try_main() {
        eprintln!("Error: {:?}", e);
        std::process::exit(1)
    }
}
