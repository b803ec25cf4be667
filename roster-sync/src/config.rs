//! Roster configuration.
//!
//! Loaded from JSON. Every field has a default, so a partial file (or `{}`)
//! is a valid configuration:
//!
//! ```json
//! {
//!   "enabled": true,
//!   "update_interval_ms": 1000,
//!   "header": ["<gold>My Server", "{online}/{max} online"],
//!   "footer": ["{tps_color}{tps} TPS"],
//!   "entries": {
//!     "enabled": true,
//!     "layout": "three-columns",
//!     "left_column": ["<aqua>Info"],
//!     "center_column": ["<yellow>Players"],
//!     "right_column": ["<aqua>You", "{ping}ms"],
//!     "max_center_players": 15
//!   }
//! }
//! ```
//!
//! The driver hands a fresh `Arc<RosterConfig>` snapshot to every refresh;
//! nothing mutates a snapshot once published.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entry::StatusIcon;

/// Configuration load/validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// How synthetic rows are arranged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LayoutMode {
    /// One list after real participants.
    #[default]
    Single,
    /// Left and right columns.
    Columns,
    /// Left, center (real participants) and right columns.
    ThreeColumns,
}

/// Synthetic roster entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntriesConfig {
    pub enabled: bool,
    pub layout: LayoutMode,
    /// Lines for single-list mode.
    pub lines: Vec<String>,
    pub left_column: Vec<String>,
    pub center_column: Vec<String>,
    pub right_column: Vec<String>,
    /// Slots per column in multi-column modes.
    pub column_slots: usize,
    /// Participants shown in the center column before the overflow counter.
    pub max_center_players: Option<usize>,
    /// Overflow counter template; `{count}` is the hidden participant count.
    pub counter_template: String,
    /// Sorts below every real participant name.
    pub before_prefix: char,
    /// Sorts above every real participant name.
    pub after_prefix: char,
    pub latency: i32,
    pub status_icon: StatusIcon,
}

impl Default for EntriesConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            layout: LayoutMode::Single,
            lines: Vec::new(),
            left_column: Vec::new(),
            center_column: Vec::new(),
            right_column: Vec::new(),
            column_slots: 20,
            max_center_players: None,
            counter_template: "<dark_gray>...and <gold>{count}</gold> more</dark_gray>".to_string(),
            before_prefix: '!',
            after_prefix: '~',
            latency: 0,
            status_icon: StatusIcon::Normal,
        }
    }
}

/// Top-level roster configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    /// Master switch: header/footer and entries.
    pub enabled: bool,
    /// Periodic refresh interval.
    pub update_interval_ms: u64,
    /// Delay between a viewer joining and its first refresh.
    pub join_delay_ms: u64,
    pub header: Vec<String>,
    pub footer: Vec<String>,
    pub entries: EntriesConfig,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            update_interval_ms: 1000,
            join_delay_ms: 1000,
            header: Vec::new(),
            footer: Vec::new(),
            entries: EntriesConfig::default(),
        }
    }
}

impl RosterConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded roster config from {}", path.display());
        Ok(config)
    }

    /// Whether synthetic entries should be shown at all.
    pub fn entries_enabled(&self) -> bool {
        self.enabled && self.entries.enabled
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.update_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "update_interval_ms",
                reason: "must be positive".into(),
            });
        }

        let entries = &self.entries;
        if entries.column_slots == 0 {
            return Err(ConfigError::Invalid {
                field: "entries.column_slots",
                reason: "must be positive".into(),
            });
        }
        if !entries.before_prefix.is_ascii_graphic() || entries.before_prefix >= '0' {
            return Err(ConfigError::Invalid {
                field: "entries.before_prefix",
                reason: format!("'{}' does not sort below names", entries.before_prefix),
            });
        }
        if !entries.after_prefix.is_ascii_graphic() || entries.after_prefix <= 'z' {
            return Err(ConfigError::Invalid {
                field: "entries.after_prefix",
                reason: format!("'{}' does not sort above names", entries.after_prefix),
            });
        }
        if entries.latency < 0 {
            return Err(ConfigError::Invalid {
                field: "entries.latency",
                reason: format!("{} is negative", entries.latency),
            });
        }

        let columns: Vec<(&'static str, &Vec<String>)> = match entries.layout {
            LayoutMode::Single => Vec::new(),
            LayoutMode::Columns => vec![
                ("entries.left_column", &entries.left_column),
                ("entries.right_column", &entries.right_column),
            ],
            LayoutMode::ThreeColumns => vec![
                ("entries.left_column", &entries.left_column),
                ("entries.center_column", &entries.center_column),
                ("entries.right_column", &entries.right_column),
            ],
        };
        for (field, lines) in columns {
            if lines.len() > entries.column_slots {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!(
                        "{} lines exceed the column budget of {}",
                        lines.len(),
                        entries.column_slots
                    ),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = RosterConfig::default();
        assert!(config.enabled);
        assert_eq!(config.update_interval_ms, 1000);
        assert_eq!(config.join_delay_ms, 1000);
        assert!(!config.entries.enabled);
        assert_eq!(config.entries.layout, LayoutMode::Single);
        assert_eq!(config.entries.column_slots, 20);
        assert_eq!(config.entries.before_prefix, '!');
        assert_eq!(config.entries.after_prefix, '~');
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_empty_json_is_default() {
        let config = RosterConfig::from_json("{}").unwrap();
        assert_eq!(config, RosterConfig::default());
    }

    #[test]
    fn test_config_partial_json() {
        let config = RosterConfig::from_json(
            r#"{
                "header": ["<gold>Hello"],
                "entries": {
                    "enabled": true,
                    "layout": "three-columns",
                    "center_column": ["<yellow>Players"],
                    "max_center_players": 5,
                    "status_icon": "spectator"
                }
            }"#,
        )
        .unwrap();
        assert_eq!(config.header, vec!["<gold>Hello"]);
        assert!(config.entries_enabled());
        assert_eq!(config.entries.layout, LayoutMode::ThreeColumns);
        assert_eq!(config.entries.max_center_players, Some(5));
        assert_eq!(config.entries.status_icon, StatusIcon::Spectator);
        assert_eq!(config.entries.column_slots, 20);
    }

    #[test]
    fn test_config_rejects_bad_prefixes() {
        let mut config = RosterConfig::default();
        config.entries.before_prefix = 'a';
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field: "entries.before_prefix", .. })
        ));

        let mut config = RosterConfig::default();
        config.entries.after_prefix = '!';
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_rejects_zero_budget() {
        let mut config = RosterConfig::default();
        config.entries.column_slots = 0;
        assert!(config.validate().is_err());

        let mut config = RosterConfig::default();
        config.update_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_parse_error() {
        assert!(matches!(
            RosterConfig::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_config_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"update_interval_ms": 250, "entries": {{"lines": ["A"]}}}}"#).unwrap();

        let config = RosterConfig::load(file.path()).unwrap();
        assert_eq!(config.update_interval_ms, 250);
        assert_eq!(config.entries.lines, vec!["A"]);
    }

    #[test]
    fn test_config_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = RosterConfig::load(dir.path().join("missing.json"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
