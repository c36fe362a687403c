use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

pub mod reader;

pub use reader::{ConfigReader, Configuration, FromConfigValue};
pub use toml::Value as ConfigValue;

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub models: ModelConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// 自动发现配置文件：优先读取环境变量 `PIXDET_CONFIG`，否则寻找 `./config/default.toml`。
    /// 若文件缺失，则返回默认配置。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os("PIXDET_CONFIG") {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "获取当前工作目录失败".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，支持设置默认等级。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 探测器模型相关设置：模型文件搜索路径与几何后端可用的材料列表。
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub search_paths: Vec<PathBuf>,
    #[serde(default = "ModelConfig::default_materials")]
    pub known_materials: Vec<String>,
}

impl ModelConfig {
    fn default_materials() -> Vec<String> {
        ["silicon", "aluminum", "g10", "solder", "epoxy", "kapton", "copper", "world_material"]
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// 在搜索路径中查找 `<name>.toml`，找不到时返回 `None`。
    pub fn locate(&self, name: &str) -> Option<PathBuf> {
        let file_name = format!("{name}.toml");
        self.search_paths
            .iter()
            .map(|root| root.join(&file_name))
            .find(|candidate| candidate.is_file())
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            known_materials: Self::default_materials(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("配置段 {section} 中缺少键 `{key}`")]
    MissingKey { section: String, key: String },
    #[error("配置段 {section} 中的键 `{key}` 无法读取为{expected}")]
    SchemaMismatch {
        section: String,
        key: String,
        expected: &'static str,
    },
    #[error("读取配置文件 {path:?} 失败: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("解析配置文件 {path:?} 失败: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("解析配置内容失败: {source}")]
    Syntax {
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

impl ConfigError {
    /// 键缺失或类型不符：即 schema 层面的失败，而非数值约束失败。
    #[inline]
    pub fn is_schema_failure(&self) -> bool {
        matches!(
            self,
            ConfigError::MissingKey { .. } | ConfigError::SchemaMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_returned_when_file_missing() {
        let cfg = AppConfig::discover().expect("discover should succeed");
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.models.search_paths.is_empty());
        assert!(cfg.models.known_materials.iter().any(|m| m == "g10"));
        assert!(cfg.models.known_materials.iter().any(|m| m == "silicon"));
    }

    #[test]
    fn load_from_temp_file() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(
            file,
            r#"
            [logging]
            level = "debug"

            [models]
            search_paths = ["../models", "/opt/pixdet/models"]
            known_materials = ["silicon", "g10"]
            "#
        )
        .unwrap();

        let cfg = AppConfig::from_file(file.path()).expect("load config");
        assert_eq!(cfg.logging.level, "debug");
        assert_eq!(cfg.models.search_paths.len(), 2);
        assert_eq!(cfg.models.known_materials, vec!["silicon", "g10"]);
    }

    #[test]
    fn malformed_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        writeln!(file, "[logging\nlevel = ").unwrap();
        let err = AppConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn locate_finds_model_in_search_path() {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::write(dir.path().join("timepix.toml"), "pixel_size = [0.055, 0.055]\n").unwrap();
        let models = ModelConfig {
            search_paths: vec![PathBuf::from("/nonexistent"), dir.path().to_path_buf()],
            ..ModelConfig::default()
        };
        assert_eq!(
            models.locate("timepix"),
            Some(dir.path().join("timepix.toml"))
        );
        assert!(models.locate("medipix").is_none());
    }

    #[test]
    fn schema_failures_are_classified() {
        let missing = ConfigError::MissingKey {
            section: "<global>".into(),
            key: "pixel_size".into(),
        };
        assert!(missing.is_schema_failure());
        let context = ConfigError::Context {
            message: "x".into(),
            source: std::io::Error::other("boom"),
        };
        assert!(!context.is_schema_failure());
    }
}
