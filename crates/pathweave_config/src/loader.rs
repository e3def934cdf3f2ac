//! Loading router settings from TOML.

use crate::error::ConfigError;
use crate::types::RouterConfig;
use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize)]
struct ConfigFile {
    #[serde(default)]
    router: RouterConfig,
}

/// Loads and validates router settings from a TOML file.
///
/// The file must contain a `[router]` table; a missing table yields the
/// defaults.
pub fn load_config(path: &Path) -> Result<RouterConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_config_from_str(&content)
}

/// Parses and validates router settings from a TOML string.
pub fn load_config_from_str(content: &str) -> Result<RouterConfig, ConfigError> {
    let file: ConfigFile = toml::from_str(content)?;
    file.router.validate()?;
    Ok(file.router)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_gives_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config, RouterConfig::default());
    }

    #[test]
    fn partial_router_table() {
        let toml = r#"
[router]
max_iterations = 12
allow_route_throughs = true
present_congestion_growth = 1.5
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(config.max_iterations, 12);
        assert!(config.allow_route_throughs);
        assert_eq!(config.present_congestion_growth, 1.5);
        assert_eq!(config.wire_capacity, 1);
    }

    #[test]
    fn invalid_value_rejected() {
        let toml = "[router]\nwire_capacity = 0\n";
        let err = load_config_from_str(toml).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "wire_capacity",
                ..
            }
        ));
    }

    #[test]
    fn malformed_toml_rejected() {
        let err = load_config_from_str("[router\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn missing_file() {
        let err = load_config(Path::new("/nonexistent/pathweave.toml")).unwrap_err();
        match err {
            ConfigError::Io { path, .. } => assert!(path.ends_with("pathweave.toml")),
            other => panic!("expected an I/O error, got {other}"),
        }
    }
}
