use crate::similarity::Metric;
use crate::store::LoadOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read or write session file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML session file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize session to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
}

/// Defaults for an analysis session, read from a TOML file. Missing tables and
/// keys take their built-in defaults; command-line flags override both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub analysis: AnalysisConfig,
    pub parsing: ParsingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Similarity metric name; unknown names resolve to identity.
    pub metric: Metric,
    /// Marker whose call labels each phylogeny leaf.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotate_marker: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    pub comment_prefix: String,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            comment_prefix: LoadOptions::default().comment_prefix,
        }
    }
}

impl SessionConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let toml_string = fs::read_to_string(path)?;
        let config = toml::from_str(&toml_string)?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            comment_prefix: self.parsing.comment_prefix.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn missing_keys_take_defaults() {
        let config: SessionConfig = toml::from_str("").unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.analysis.metric, Metric::Identity);
        assert_eq!(config.load_options(), LoadOptions::default());
    }

    #[test]
    fn parses_all_sections() {
        let config: SessionConfig = toml::from_str(
            "[analysis]\nmetric = \"halfidentity\"\nannotate_marker = \"rs53576\"\n\n[parsing]\ncomment_prefix = \"//\"\n",
        )
        .unwrap();
        assert_eq!(config.analysis.metric, Metric::HalfIdentity);
        assert_eq!(config.analysis.annotate_marker.as_deref(), Some("rs53576"));
        assert_eq!(config.load_options().comment_prefix, "//");
    }

    #[test]
    fn unknown_metric_falls_back_to_identity() {
        let config: SessionConfig = toml::from_str("[analysis]\nmetric = \"hamming\"\n").unwrap();
        assert_eq!(config.analysis.metric, Metric::Identity);
    }

    #[test]
    fn empty_comment_prefix_loads_every_line() {
        let config: SessionConfig = toml::from_str("[parsing]\ncomment_prefix = \"\"\n").unwrap();
        let store = crate::store::GenotypeStore::from_reader(
            "memory",
            std::io::Cursor::new(b"rs1\t1\t10\tAA\n".as_slice()),
            &config.load_options(),
        )
        .unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn save_and_load_round_trip() {
        let file = NamedTempFile::new().expect("Failed to create temp file");
        let original = SessionConfig {
            analysis: AnalysisConfig {
                metric: Metric::HalfIdentity,
                annotate_marker: Some("rs4680".to_string()),
            },
            parsing: ParsingConfig::default(),
        };
        original.save(file.path()).expect("Failed to save session");
        let loaded = SessionConfig::load(file.path()).expect("Failed to load session");
        assert_eq!(loaded, original);
    }
}
