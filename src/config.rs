use std::{fs::File, io::BufReader, path::Path};

use serde::Deserialize;

use crate::{assembly::Target, errors::Result};

pub const DEFAULT_COLOR: &str = "#3388ff";

#[derive(Deserialize, Debug, Clone)]
pub struct UserConfig {
    pub data_path: String,
    #[serde(default = "default_output_root")]
    pub output_root: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Rebuild stage outputs even when a cached file exists.
    #[serde(default)]
    pub refresh: bool,
    /// Single element to assemble. Without it every area in the payload is built.
    #[serde(default)]
    pub target: Option<TargetConfig>,
    #[serde(default)]
    pub style: FeatureStyle,
}

fn default_output_root() -> String {
    "output".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct TargetConfig {
    #[serde(flatten)]
    pub target: Target,
    /// Overrides the element's `name` tag.
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct FeatureStyle {
    #[serde(default)]
    pub classification: Option<String>,
    #[serde(default = "default_color", deserialize_with = "serialize_color::deserialize")]
    pub color: String,
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

impl Default for FeatureStyle {
    fn default() -> Self {
        FeatureStyle {
            classification: None,
            color: default_color(),
        }
    }
}

mod serialize_color {
    use std::sync::OnceLock;

    use regex::Regex;
    use serde::{de, Deserializer};
    use serde::de::Visitor;

    fn hex_color() -> &'static Regex {
        static HEX_COLOR: OnceLock<Regex> = OnceLock::new();
        HEX_COLOR.get_or_init(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("hex color pattern is valid"))
    }

    struct ColorVisitor;

    impl<'de> Visitor<'de> for ColorVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(formatter, "a color string of the form '#rrggbb'")
        }

        fn visit_str<E>(self, string: &str) -> Result<Self::Value, E> where E: de::Error {
            if !hex_color().is_match(string) {
                return Err(de::Error::invalid_value(de::Unexpected::Str(string), &self))
            }
            Ok(string.to_ascii_lowercase())
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<String, D::Error>
        where D: Deserializer<'de> {
        deserializer.deserialize_str(ColorVisitor)
    }
}

pub fn load_user_config(path: &Path) -> Result<UserConfig> {
    let file = File::open(path)
        .map_err(|err| format!("Could not open config file {}: {err}", path.display()))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_defaults() {
        let config: UserConfig = serde_json::from_str(r#"{"data_path": "data/monaco.json"}"#).unwrap();
        assert_eq!(config.output_root, "output");
        assert_eq!(config.log_level, "info");
        assert!(!config.refresh);
        assert!(config.target.is_none());
        assert_eq!(config.style, FeatureStyle::default());
    }

    #[test]
    fn reads_target_and_style() {
        let config: UserConfig = serde_json::from_str(r##"{
            "data_path": "data/monaco.osm.xz",
            "target": {"type": "relation", "id": 1124039, "name": "Monaco"},
            "style": {"classification": "boundary=administrative", "color": "#FF8800"}
        }"##).unwrap();
        assert_eq!(config.target, Some(TargetConfig {
            target: Target::relation(1124039),
            name: Some("Monaco".to_string()),
        }));
        assert_eq!(config.style.color, "#ff8800");
        assert_eq!(config.style.classification.as_deref(), Some("boundary=administrative"));
    }

    #[test]
    fn rejects_malformed_colors() {
        for color in ["red", "#12345", "#1234567", "#gg0000"] {
            let json = format!(r#"{{"color": "{color}"}}"#);
            assert!(serde_json::from_str::<FeatureStyle>(&json).is_err(), "{color} was accepted");
        }
    }
}
