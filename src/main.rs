use clap::Parser;

use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

use dataset2yolo::{Args, Dataset, Materializer};

fn main() -> ExitCode {
    // Initialize the logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let dataset_path = PathBuf::from(&args.dataset);
    if !dataset_path.exists() {
        error!("The specified dataset does not exist: {}", args.dataset);
        return ExitCode::FAILURE;
    }

    let dataset = match Dataset::from_json_file(&dataset_path) {
        Ok(dataset) => dataset,
        Err(e) => {
            error!("Failed to load dataset: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!(
        "Loaded {} images in {} categories.",
        dataset.images.len(),
        dataset.categories.len()
    );

    let materializer = Materializer::new(args.materializer_config());
    match materializer.prepare(&dataset, &PathBuf::from(&args.output_dir), args.split_ratio) {
        Ok(manifest_path) => {
            println!("{}", manifest_path.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to materialize dataset: {}", e);
            ExitCode::FAILURE
        }
    }
}
