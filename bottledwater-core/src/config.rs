//! Configuration types

use crate::{BottledWaterError, BottledWaterResult, ConfigError};
use chrono::FixedOffset;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Wire format produced by the encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Json,
    /// Schema-registry binary format. Never built into this crate set.
    Avro,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Avro => write!(f, "avro"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "avro" => Ok(OutputFormat::Avro),
            _ => Err(ConfigError::InvalidValue {
                field: "format".to_string(),
                value: s.to_string(),
                reason: "expected 'json' or 'avro'".to_string(),
            }),
        }
    }
}

/// Session time zone used to render `timestamp with time zone` values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionZone {
    /// Seconds east of UTC.
    pub offset_seconds: i32,
    /// Zone abbreviation appended after the offset when known (e.g. `CEST`).
    pub abbreviation: Option<String>,
}

impl SessionZone {
    pub fn utc() -> Self {
        Self {
            offset_seconds: 0,
            abbreviation: None,
        }
    }

    pub fn fixed(offset_seconds: i32, abbreviation: Option<&str>) -> Self {
        Self {
            offset_seconds,
            abbreviation: abbreviation.map(str::to_string),
        }
    }

    /// The offset as a chrono value, `None` when out of range.
    pub fn offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.offset_seconds)
    }
}

impl Default for SessionZone {
    fn default() -> Self {
        Self::utc()
    }
}

/// Encoder configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    pub format: OutputFormat,
    /// Bytes reserved up front for each output buffer.
    pub initial_buffer_capacity: usize,
    /// Default for snapshot scans: read only the named table, not inheriting children.
    pub exclude_child_tables: bool,
    /// Namespaces matching any of these patterns are left out of snapshot planning.
    pub skip_namespace_patterns: Vec<String>,
    pub session_zone: SessionZone,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Json,
            initial_buffer_capacity: 1024,
            exclude_child_tables: false,
            skip_namespace_patterns: vec![
                "^pg_".to_string(),
                "^information_schema$".to_string(),
            ],
            session_zone: SessionZone::utc(),
        }
    }
}

impl EncoderConfig {
    /// Parse and validate a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> BottledWaterResult<Self> {
        let config: EncoderConfig = toml::from_str(input).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Build from logical-decoding plugin options (`format` = `JSON`, ...).
    pub fn from_options<I, K, V>(options: I) -> BottledWaterResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut config = EncoderConfig::default();
        for (key, value) in options {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "format" => config.format = value.parse()?,
                "initial_buffer_capacity" => {
                    config.initial_buffer_capacity =
                        value.parse().map_err(|_| ConfigError::InvalidValue {
                            field: key.to_string(),
                            value: value.to_string(),
                            reason: "expected a byte count".to_string(),
                        })?;
                }
                "exclude_child_tables" => {
                    config.exclude_child_tables = parse_bool(key, value)?;
                }
                "session_zone_offset_seconds" => {
                    config.session_zone.offset_seconds =
                        value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                            field: key.to_string(),
                            value: value.to_string(),
                            reason: "expected seconds east of UTC".to_string(),
                        })?;
                }
                "session_zone_abbreviation" => {
                    config.session_zone.abbreviation =
                        Some(value.trim()).filter(|v| !v.is_empty()).map(str::to_string);
                }
                _ => {
                    return Err(ConfigError::UnknownOption {
                        key: key.to_string(),
                    }
                    .into())
                }
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - initial_buffer_capacity > 0
    /// - every skip pattern compiles
    /// - the session zone offset is representable
    pub fn validate(&self) -> BottledWaterResult<()> {
        if self.initial_buffer_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "initial_buffer_capacity".to_string(),
                value: "0".to_string(),
                reason: "must be greater than 0".to_string(),
            }
            .into());
        }

        self.skip_namespace_regexes()?;

        if self.session_zone.offset().is_none() {
            return Err(ConfigError::InvalidValue {
                field: "session_zone.offset_seconds".to_string(),
                value: self.session_zone.offset_seconds.to_string(),
                reason: "must be within one day of UTC".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Compile the namespace skip patterns.
    pub fn skip_namespace_regexes(&self) -> BottledWaterResult<Vec<Regex>> {
        self.skip_namespace_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| {
                    BottledWaterError::from(ConfigError::InvalidValue {
                        field: "skip_namespace_patterns".to_string(),
                        value: pattern.clone(),
                        reason: e.to_string(),
                    })
                })
            })
            .collect()
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "1" | "yes" => Ok(true),
        "false" | "off" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: key.to_string(),
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EncoderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.format, OutputFormat::Json);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = EncoderConfig {
            initial_buffer_capacity: 0,
            ..EncoderConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(BottledWaterError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_bad_pattern_rejected() {
        let config = EncoderConfig {
            skip_namespace_patterns: vec!["(".to_string()],
            ..EncoderConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_with_partial_keys() {
        let config = EncoderConfig::from_toml_str(
            r#"
            format = "json"
            exclude_child_tables = true

            [session_zone]
            offset_seconds = 7200
            abbreviation = "CEST"
            "#,
        )
        .unwrap();
        assert!(config.exclude_child_tables);
        assert_eq!(config.initial_buffer_capacity, 1024);
        assert_eq!(config.session_zone.abbreviation.as_deref(), Some("CEST"));
    }

    #[test]
    fn test_from_toml_reports_parse_errors() {
        let err = EncoderConfig::from_toml_str("format = 12").unwrap_err();
        assert!(matches!(err, BottledWaterError::Config(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_from_options_is_case_insensitive_on_format() {
        let config = EncoderConfig::from_options([("format", "JSON")]).unwrap();
        assert_eq!(config.format, OutputFormat::Json);

        let config = EncoderConfig::from_options([("format", "Avro")]).unwrap();
        assert_eq!(config.format, OutputFormat::Avro);
    }

    #[test]
    fn test_from_options_rejects_unknown_keys() {
        let err = EncoderConfig::from_options([("colour", "blue")]).unwrap_err();
        assert_eq!(
            err,
            BottledWaterError::Config(ConfigError::UnknownOption {
                key: "colour".to_string()
            })
        );
    }

    #[test]
    fn test_from_options_parses_booleans() {
        let config = EncoderConfig::from_options([("exclude_child_tables", "on")]).unwrap();
        assert!(config.exclude_child_tables);
        assert!(EncoderConfig::from_options([("exclude_child_tables", "maybe")]).is_err());
    }

    #[test]
    fn test_from_options_sets_session_zone() {
        let config = EncoderConfig::from_options([
            ("session_zone_offset_seconds", "-18000"),
            ("session_zone_abbreviation", "EST"),
        ])
        .unwrap();
        assert_eq!(config.session_zone, SessionZone::fixed(-18000, Some("EST")));

        let config = EncoderConfig::from_options([("session_zone_abbreviation", "")]).unwrap();
        assert_eq!(config.session_zone, SessionZone::utc());
    }

    #[test]
    fn test_from_options_rejects_bad_zone_offsets() {
        assert!(matches!(
            EncoderConfig::from_options([("session_zone_offset_seconds", "east")]),
            Err(BottledWaterError::Config(ConfigError::InvalidValue { .. }))
        ));
        let err = EncoderConfig::from_options([("session_zone_offset_seconds", "86400")]).unwrap_err();
        assert_eq!(
            err,
            BottledWaterError::Config(ConfigError::InvalidValue {
                field: "session_zone.offset_seconds".to_string(),
                value: "86400".to_string(),
                reason: "must be within one day of UTC".to_string(),
            })
        );
    }
}
