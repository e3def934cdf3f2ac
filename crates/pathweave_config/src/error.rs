//! Errors raised while reading or checking router settings.

use std::path::PathBuf;

/// A settings file that could not be read, or settings the router cannot use.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("failed to read router settings from {}: {source}", path.display())]
    Io {
        /// The file that was requested.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The document is not valid TOML or does not match the `[router]` schema.
    #[error("malformed router settings: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field holds a value the router cannot work with.
    #[error("invalid router setting `{field}`: {reason}")]
    Invalid {
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with its value.
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_names_the_field() {
        let err = ConfigError::invalid("wire_capacity", "must be at least 1");
        assert_eq!(
            err.to_string(),
            "invalid router setting `wire_capacity`: must be at least 1"
        );
    }

    #[test]
    fn io_names_the_file() {
        let err = ConfigError::Io {
            path: PathBuf::from("route.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
        };
        assert_eq!(
            err.to_string(),
            "failed to read router settings from route.toml: no such file"
        );
    }
}
