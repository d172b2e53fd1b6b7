//! INI file configuration adapter.

use crate::domain::error::FutalphaError;
use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;
use std::str::FromStr;

#[derive(Debug)]
pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FutalphaError> {
        let path = path.as_ref();
        let mut config = Ini::new();
        config.load(path).map_err(|reason| FutalphaError::ConfigParse {
            file: path.display().to_string(),
            reason,
        })?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, FutalphaError> {
        let mut config = Ini::new();
        config
            .read(content.to_string())
            .map_err(|reason| FutalphaError::ConfigParse {
                file: "<string>".to_string(),
                reason,
            })?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }

    fn parse<T: FromStr>(
        &self,
        section: &str,
        key: &str,
        default: T,
        expected: &str,
    ) -> Result<T, FutalphaError> {
        match self.get_string(section, key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|_| {
                FutalphaError::config_invalid(
                    section,
                    key,
                    format!("expected {expected}, got '{raw}'"),
                )
            }),
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config
            .get(section, key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> Result<i64, FutalphaError> {
        self.parse(section, key, default, "an integer")
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> Result<f64, FutalphaError> {
        self.parse(section, key, default, "a number")
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> Result<bool, FutalphaError> {
        match self.get_string(section, key) {
            None => Ok(default),
            Some(raw) => Self::parse_bool(&raw).ok_or_else(|| {
                FutalphaError::config_invalid(section, key, format!("expected a boolean, got '{raw}'"))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[data]
dir = /srv/futures/cont
symbols = NIFTY, BANKNIFTY

[scoring]
top_n = 5
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("data", "dir"),
            Some("/srv/futures/cont".to_string())
        );
        assert_eq!(
            adapter.get_string("data", "symbols"),
            Some("NIFTY, BANKNIFTY".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_or_blank() {
        let adapter = FileConfigAdapter::from_string("[data]\ndir =\n").unwrap();
        assert_eq!(adapter.get_string("data", "dir"), None);
        assert_eq!(adapter.get_string("data", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn get_int_returns_value_or_default() {
        let adapter = FileConfigAdapter::from_string("[scoring]\ntop_n = 7\n").unwrap();
        assert_eq!(adapter.get_int("scoring", "top_n", 5).unwrap(), 7);
        assert_eq!(adapter.get_int("scoring", "missing", 42).unwrap(), 42);
    }

    #[test]
    fn get_int_rejects_non_numeric() {
        let adapter = FileConfigAdapter::from_string("[scoring]\ntop_n = abc\n").unwrap();
        let err = adapter.get_int("scoring", "top_n", 5).unwrap_err();
        assert!(matches!(err, FutalphaError::ConfigInvalid { ref key, .. } if key == "top_n"));
    }

    #[test]
    fn get_double_accepts_exponent() {
        let adapter = FileConfigAdapter::from_string("[scoring]\nmin_liquidity = 1e7\n").unwrap();
        assert_eq!(adapter.get_double("scoring", "min_liquidity", 0.0).unwrap(), 1e7);
        assert_eq!(adapter.get_double("scoring", "missing", 99.9).unwrap(), 99.9);
    }

    #[test]
    fn get_double_rejects_non_numeric() {
        let adapter =
            FileConfigAdapter::from_string("[sizing]\nmax_weight = twenty\n").unwrap();
        assert!(adapter.get_double("sizing", "max_weight", 0.2).is_err());
    }

    #[test]
    fn get_bool_values() {
        let adapter = FileConfigAdapter::from_string(
            "[regime]\na = true\nb = yes\nc = 1\nd = false\ne = no\nf = 0\ng = maybe\n",
        )
        .unwrap();
        assert!(adapter.get_bool("regime", "a", false).unwrap());
        assert!(adapter.get_bool("regime", "b", false).unwrap());
        assert!(adapter.get_bool("regime", "c", false).unwrap());
        assert!(!adapter.get_bool("regime", "d", true).unwrap());
        assert!(!adapter.get_bool("regime", "e", true).unwrap());
        assert!(!adapter.get_bool("regime", "f", true).unwrap());
        assert!(adapter.get_bool("regime", "g", true).is_err());
        assert!(adapter.get_bool("regime", "missing", true).unwrap());
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[output]\ndir = /tmp/futalpha\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("output", "dir"),
            Some("/tmp/futalpha".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let err = FileConfigAdapter::from_file("/nonexistent/path/config.ini").unwrap_err();
        assert!(matches!(err, FutalphaError::ConfigParse { .. }));
    }
}
