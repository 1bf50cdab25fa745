use std::fs::create_dir_all;
use std::io;
use std::path::{Path, PathBuf};

use clap::Parser;
use structured_logger::json::new_writer;
use structured_logger::Builder;

use osm_rings::config::{load_user_config, UserConfig};
use osm_rings::errors::Result;
use osm_rings::etl::run_pipeline;

#[derive(Parser, Debug)]
#[command(name = "osm_rings", about = "Assemble OSM ways and relations into GeoJSON areas")]
struct Cli {
    /// JSON config naming the input payload and target.
    #[arg(default_value = "config/example.json")]
    config: PathBuf,
}

fn create_output_dir(config: &UserConfig) -> Result<PathBuf> {
    let input_fname = Path::new(&config.data_path)
        .file_name()
        .ok_or("Could not get input file name")?;
    let output_dir = Path::new(&config.output_root).join(input_fname);
    create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn setup_logging(level: &str) {
    Builder::with_level(level)
        .with_target_writer("*", new_writer(io::stdout()))
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let user_config = load_user_config(&cli.config)?;
    setup_logging(&user_config.log_level);

    let output_dir = create_output_dir(&user_config)?;
    run_pipeline(&user_config, &output_dir)
}
