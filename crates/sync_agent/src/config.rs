//! TOML-deserialized mapping configuration.
//!
//! A real deployment names which local trees mirror to which remote
//! destinations, and which skip policy applies, in a config file rather
//! than hardcoding `Mapping`s - this is that file's shape.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use sync_proto::Mapping;

#[derive(Debug, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub mapping: Vec<MappingConfig>,

    #[serde(default)]
    pub skip: SkipConfig,
}

#[derive(Debug, Deserialize)]
pub struct MappingConfig {
    pub local_root: PathBuf,
    pub remote_dest: String,
}

/// Which of the "standard policies" (§6) to apply. `Glob`'s patterns are
/// matched relative to each mapping's local root.
#[derive(Debug, Default, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum SkipConfig {
    #[default]
    None,
    DotGit,
    Glob {
        patterns: Vec<String>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl AgentConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn mappings(&self) -> Vec<Mapping> {
        self.mapping
            .iter()
            .map(|m| Mapping::new(m.local_root.clone(), m.remote_dest.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mappings_and_dotgit_skip() {
        let toml = r#"
            [[mapping]]
            local_root = "/home/user/project"
            remote_dest = "project"

            [skip]
            policy = "dot_git"
        "#;

        let config: AgentConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.mapping.len(), 1);
        assert_eq!(config.mapping[0].remote_dest, "project");
        assert!(matches!(config.skip, SkipConfig::DotGit));
    }

    #[test]
    fn defaults_to_no_skip_policy() {
        let toml = r#"
            [[mapping]]
            local_root = "/a"
            remote_dest = "a"
        "#;

        let config: AgentConfig = toml::from_str(toml).unwrap();
        assert!(matches!(config.skip, SkipConfig::None));
    }
}
