use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use super::options::{merge_layers, OptionKey, OptionLayer, OptionValue};

pub const DEFAULT_TEMPLATE_PATH: &str =
    "https://cdn.jsdelivr.net/npm/prismjs@[[version]]/[[path]]";

/// Environment variable holding the hosting script's own URL.
pub const SCRIPT_SRC_ENV: &str = "PRISMIZE_SCRIPT_SRC";
/// Environment variable pointing at a YAML file of defaults.
pub const DEFAULTS_PATH_ENV: &str = "PRISMIZE_DEFAULTS";

#[derive(Debug, Error)]
pub enum DefaultsError {
    #[error("failed to read defaults file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Page-level defaults. Built once at startup and shared read-only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageDefaults {
    layer: OptionLayer,
}

impl PageDefaults {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_layer(layer: OptionLayer) -> Self {
        Self { layer }
    }

    /// Reads defaults from the query string of the script reference that
    /// loaded the page integration, e.g.
    /// `https://host/prismize.js?copyable&theme=okaidia`.
    pub fn from_script_url(src: &str) -> Self {
        let query = match Url::parse(src) {
            Ok(url) => url.query().map(str::to_string),
            Err(_) => src
                .split_once('?')
                .map(|(_, rest)| rest.split('#').next().unwrap_or_default().to_string()),
        };
        query
            .map(|query| Self::from_query(&query))
            .unwrap_or_default()
    }

    pub fn from_query(query: &str) -> Self {
        let pairs: Vec<(String, String)> = match serde_urlencoded::from_str(query) {
            Ok(pairs) => pairs,
            Err(err) => {
                warn!(target: "config", error = %err, "ignoring malformed defaults query");
                return Self::default();
            }
        };

        let mut layer = OptionLayer::new();
        for (name, value) in pairs {
            match declarative_key(&name) {
                Some(key) => {
                    layer.set(key, value);
                }
                None => debug!(target: "config", option = %name, "ignoring unknown default"),
            }
        }
        Self { layer }
    }

    /// Loads defaults from a YAML mapping of camelCase option names to
    /// scalars. A missing path or file yields empty defaults.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, DefaultsError> {
        let Some(path) = config_path.filter(|path| path.exists()) else {
            return Ok(Self::default());
        };

        let contents = fs::read_to_string(path)?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let raw: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(&contents)?;

        let mut layer = OptionLayer::new();
        for (name, value) in raw {
            let Some(key) = declarative_key(&name) else {
                debug!(target: "config", option = %name, "ignoring unknown default");
                continue;
            };
            let value = match value {
                serde_yaml::Value::Bool(flag) => OptionValue::Bool(flag),
                serde_yaml::Value::Number(number) => match number.as_f64() {
                    Some(number) => OptionValue::Number(number),
                    None => continue,
                },
                serde_yaml::Value::String(text) => OptionValue::Text(text),
                serde_yaml::Value::Null => continue,
                other => {
                    warn!(target: "config", option = %name, value = ?other, "default is not a scalar");
                    continue;
                }
            };
            layer.set(key, value);
        }
        Ok(Self { layer })
    }

    /// Script URL defaults from `PRISMIZE_SCRIPT_SRC` layered over the YAML
    /// file named by `PRISMIZE_DEFAULTS`.
    pub fn from_env() -> Result<Self, DefaultsError> {
        let from_file = Self::load(std::env::var(DEFAULTS_PATH_ENV).ok().map(PathBuf::from))?;
        let from_script = std::env::var(SCRIPT_SRC_ENV)
            .map(|src| Self::from_script_url(&src))
            .unwrap_or_default();
        Ok(from_script.layered_over(&from_file))
    }

    /// Keeps every value of `self` and fills the gaps from `base`.
    pub fn layered_over(&self, base: &PageDefaults) -> Self {
        Self {
            layer: merge_layers(&[&self.layer, &base.layer]),
        }
    }

    pub fn layer(&self) -> &OptionLayer {
        &self.layer
    }

    pub fn get(&self, key: OptionKey) -> Option<&OptionValue> {
        self.layer.get(key)
    }
}

fn declarative_key(name: &str) -> Option<OptionKey> {
    OptionKey::from_camel_name(name).filter(|key| key.is_declarative())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn parses_script_query() {
        let defaults = PageDefaults::from_script_url(
            "https://cdn.example/prismize.js?copyable=Copy+it&numberLines=5&showLanguage&bogus=1#top",
        );
        assert_eq!(defaults.get(OptionKey::Copyable), Some(&OptionValue::from("Copy it")));
        assert_eq!(defaults.get(OptionKey::NumberLines), Some(&OptionValue::from("5")));
        assert_eq!(defaults.get(OptionKey::ShowLanguage), Some(&OptionValue::from("")));
        assert_eq!(defaults.layer().len(), 3);
    }

    #[test]
    fn decodes_percent_escapes_and_relative_urls() {
        let defaults = PageDefaults::from_script_url(
            "/js/prismize.js?templatePath=%2Fvendor%2Fprism%2F%5B%5Bpath%5D%5D",
        );
        assert_eq!(
            defaults.get(OptionKey::TemplatePath),
            Some(&OptionValue::from("/vendor/prism/[[path]]"))
        );
    }

    #[test]
    fn script_without_query_has_no_defaults() {
        assert!(PageDefaults::from_script_url("https://cdn.example/prismize.js")
            .layer()
            .is_empty());
    }

    #[test]
    fn ignores_non_declarative_keys() {
        let defaults = PageDefaults::from_query("id=frame&className=x&theme=coy");
        assert_eq!(defaults.layer().len(), 1);
    }

    #[test]
    fn loads_yaml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "maxHeight: 300\nmatchBraces: true\ntheme: okaidia\nbogus: 1").unwrap();
        let defaults = PageDefaults::load(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(defaults.get(OptionKey::MaxHeight), Some(&OptionValue::Number(300.0)));
        assert_eq!(defaults.get(OptionKey::MatchBraces), Some(&OptionValue::Bool(true)));
        assert_eq!(defaults.get(OptionKey::Theme), Some(&OptionValue::from("okaidia")));
        assert_eq!(defaults.layer().len(), 3);
    }

    #[test]
    fn missing_file_is_empty() {
        let defaults = PageDefaults::load(Some(PathBuf::from("/nonexistent/prismize.yaml"))).unwrap();
        assert!(defaults.layer().is_empty());
        assert!(PageDefaults::load(None).unwrap().layer().is_empty());
    }

    #[test]
    fn script_defaults_win_over_file_defaults() {
        let script = PageDefaults::from_query("theme=coy");
        let file = PageDefaults::from_query("theme=okaidia&tabSize=2");
        let merged = script.layered_over(&file);
        assert_eq!(merged.get(OptionKey::Theme), Some(&OptionValue::from("coy")));
        assert_eq!(merged.get(OptionKey::TabSize), Some(&OptionValue::from("2")));
    }
}
