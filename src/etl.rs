pub mod assemble_feature;
pub mod parse_osm;

use std::path::Path;
use log::{info, error};

use crate::{config::UserConfig, errors::Result};


/// One step of the pipeline. Each stage reads from and writes to files in a
/// shared working directory, and is skipped when its output already exists.
pub trait Etl {
    type Input;
    type Output;

    fn etl_name(&self) -> &str;

    fn is_cached(&self, dir: &Path) -> Result<bool>;
    fn clean(&self, dir: &Path) -> Result<()>;

    fn extract(&mut self, dir: &Path) -> Result<Self::Input>;
    fn transform(&mut self, input: Self::Input) -> Result<Self::Output>;
    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()>;

    fn process(&mut self, dir: &Path) -> Result<()> {
        info!(etl_name = self.etl_name(); "Starting ETL process");
        if self.is_cached(dir)? {
            info!(etl_name = self.etl_name(); "Using cached value");
        } else {
            info!(etl_name = self.etl_name(); "Extracting");
            let input = self.extract(dir);
            let input = log_failure(self.etl_name(), "Extraction", input)?;

            info!(etl_name = self.etl_name(); "Transforming");
            let output = self.transform(input);
            let output = log_failure(self.etl_name(), "Transformation", output)?;

            info!(etl_name = self.etl_name(); "Loading");
            let loaded = self.load(dir, output);
            log_failure(self.etl_name(), "Loading", loaded)?;
        }
        info!(etl_name = self.etl_name(); "Process finished");
        Ok(())
    }
}

/// Logs a failed step before handing the error back.
fn log_failure<T>(etl_name: &str, step: &str, result: Result<T>) -> Result<T> {
    if let Err(err) = &result {
        error!(etl_name = etl_name, step = step, err = err.message.as_str(); "ETL step failed with error");
    }
    result
}

/// Removes a stage output if present.
fn remove_if_exists(path: &Path) -> Result<()> {
    if path.try_exists()? {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

/// Runs every stage in order inside `dir`. With `refresh` set, cached stage
/// outputs are removed first.
pub fn run_pipeline(config: &UserConfig, dir: &Path) -> Result<()> {
    let mut parse = parse_osm::ParseOsmEtl::new(config);
    let mut assemble = assemble_feature::AssembleFeatureEtl::new(config);
    if config.refresh {
        parse.clean(dir)?;
        assemble.clean(dir)?;
    }
    parse.process(dir)?;
    assemble.process(dir)
}
