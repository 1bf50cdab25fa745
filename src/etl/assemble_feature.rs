use std::{fs::{self, File}, io::BufReader, path::{Path, PathBuf}};

use geojson::GeoJson;
use log::info;

use crate::{
    assembly::{build_all, build_feature, ElementIndex},
    config::UserConfig,
    data::{geometry::features_to_geojson, Element},
    errors::Result,
};

use super::{parse_osm, remove_if_exists, Etl};

pub const ETL_NAME: &str = "assemble_feature";
pub const COLLECTION_FILE_NAME: &str = "features.geojson";

pub struct AssembleFeatureEtl<'a> {
    config: &'a UserConfig,
}

impl AssembleFeatureEtl<'_> {
    pub fn new(config: &UserConfig) -> AssembleFeatureEtl<'_> {
        AssembleFeatureEtl {
            config
        }
    }

    /// `relation_1124039.geojson` for a single target, `features.geojson` otherwise.
    pub fn output_file_name(&self) -> String {
        match &self.config.target {
            Some(target) => format!("{}_{}.geojson", target.target.source_type, target.target.id),
            None => COLLECTION_FILE_NAME.to_string(),
        }
    }

    fn output_path(&self, dir: &Path) -> PathBuf {
        dir.join(self.output_file_name())
    }
}

impl Etl for AssembleFeatureEtl<'_> {
    type Input = Vec<Element>;
    type Output = GeoJson;

    fn etl_name(&self) -> &str {
        ETL_NAME
    }

    fn is_cached(&self, dir: &Path) -> Result<bool> {
        Ok(self.output_path(dir).try_exists()?)
    }

    fn clean(&self, dir: &Path) -> Result<()> {
        remove_if_exists(&self.output_path(dir))
    }

    fn extract(&mut self, dir: &Path) -> Result<Self::Input> {
        let input_file = File::open(dir.join(parse_osm::OUTPUT_FILE_NAME))?;
        parse_osm::read_overpass_json(BufReader::new(input_file))
    }

    fn transform(&mut self, input: Self::Input) -> Result<Self::Output> {
        let index = ElementIndex::new(&input);
        info!(
            etl_name = ETL_NAME,
            node_count = index.nodes.len(),
            way_count = index.ways.len(),
            incomplete_way_count = index.incomplete_ways.len();
            "Indexed elements"
        );

        match &self.config.target {
            Some(target_config) => {
                let target = target_config.target;
                let mut feature = build_feature(target, &input, &index, &self.config.style)
                    .ok_or_else(|| format!("No area found for {} {}", target.source_type, target.id))?;
                if let Some(name) = &target_config.name {
                    feature.properties.name = name.clone();
                }
                info!(
                    feature_id = feature.id().as_str(),
                    geometry_type = feature.geometry.type_name(),
                    area_m2 = feature.geodesic_area();
                    "Assembled feature"
                );
                Ok(GeoJson::Feature(feature.to_geojson()))
            },
            None => {
                let features = build_all(&input, &index, &self.config.style);
                info!(etl_name = ETL_NAME, feature_count = features.len(); "Assembled features");
                Ok(features_to_geojson(&features))
            },
        }
    }

    fn load(&mut self, dir: &Path, output: Self::Output) -> Result<()> {
        fs::write(self.output_path(dir), output.to_string())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TargetConfig;
    use crate::assembly::Target;

    fn config(target: Option<TargetConfig>) -> UserConfig {
        UserConfig {
            data_path: "data/sample.json".to_string(),
            output_root: "output".to_string(),
            log_level: "info".to_string(),
            refresh: false,
            target,
            style: Default::default(),
        }
    }

    #[test]
    fn output_name_follows_target() {
        let single = config(Some(TargetConfig { target: Target::relation(7), name: None }));
        assert_eq!(AssembleFeatureEtl::new(&single).output_file_name(), "relation_7.geojson");

        let batch = config(None);
        assert_eq!(AssembleFeatureEtl::new(&batch).output_file_name(), "features.geojson");
    }

    #[test]
    fn missing_target_fails_transform() {
        let single = config(Some(TargetConfig { target: Target::way(7), name: None }));
        let err = AssembleFeatureEtl::new(&single).transform(Vec::new()).unwrap_err();
        assert_eq!(err.message, "No area found for way 7");
    }
}
