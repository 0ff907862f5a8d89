use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

use crate::moderation::Thresholds;

pub const DEFAULT_DATA_DIR: &str = ".letotalks";
pub const DEFAULT_STUDENT_EMAIL: &str = "student@student.letovo.ru";
pub const DEFAULT_COMMENT_MAX_CHARS: usize = 2000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{var} has invalid value {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("moderation thresholds must satisfy to_label <= flag <= block within [0, 1], got {0:?}")]
    Thresholds(Thresholds),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub student_email: String,
    pub comment_max_chars: usize,
    pub thresholds: Thresholds,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            student_email: DEFAULT_STUDENT_EMAIL.to_string(),
            comment_max_chars: DEFAULT_COMMENT_MAX_CHARS,
            thresholds: Thresholds::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the config from any variable source; unset variables keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let thresholds = Thresholds {
            block: parse_or(&lookup, "LETOTALKS_MODERATION_BLOCK", defaults.thresholds.block)?,
            flag: parse_or(&lookup, "LETOTALKS_MODERATION_FLAG", defaults.thresholds.flag)?,
            to_label: parse_or(&lookup, "LETOTALKS_MODERATION_TO_LABEL", defaults.thresholds.to_label)?,
        };
        if !thresholds.is_ordered() {
            return Err(ConfigError::Thresholds(thresholds));
        }

        Ok(Self {
            data_dir: lookup("LETOTALKS_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            student_email: lookup("LETOTALKS_STUDENT_EMAIL").unwrap_or(defaults.student_email),
            comment_max_chars: parse_or(
                &lookup,
                "LETOTALKS_COMMENT_MAX_CHARS",
                defaults.comment_max_chars,
            )?,
            thresholds,
        })
    }
}

fn parse_or<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("LETOTALKS_DATA_DIR", "/tmp/lt"),
            ("LETOTALKS_COMMENT_MAX_CHARS", "140"),
            ("LETOTALKS_MODERATION_BLOCK", "0.9"),
        ]))
        .unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/tmp/lt"));
        assert_eq!(config.comment_max_chars, 140);
        assert_eq!(config.thresholds.block, 0.9);
    }

    #[test]
    fn rejects_bad_numbers_and_inverted_thresholds() {
        let err = Config::from_lookup(lookup_from(&[("LETOTALKS_COMMENT_MAX_CHARS", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("LETOTALKS_COMMENT_MAX_CHARS"));

        let err = Config::from_lookup(lookup_from(&[("LETOTALKS_MODERATION_FLAG", "0.95")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Thresholds(_)));
    }
}
