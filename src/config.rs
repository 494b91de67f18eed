// YAML configuration and the set of keys the user supplied explicitly

use crate::error::AppError;
use crate::schedule::ABSENT;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const DEFAULT_TIME_ZONE: &str = "Europe/Paris";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FontConfig {
    pub name: String,
    pub path: PathBuf,
    pub size: f32,
}

impl FontConfig {
    pub const DEFAULT_SIZE: f32 = 11.0;
}

impl Default for FontConfig {
    fn default() -> Self {
        FontConfig {
            name: "Helvetica".to_string(),
            path: PathBuf::new(),
            size: Self::DEFAULT_SIZE,
        }
    }
}

/// 42 intranet API credentials
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    #[serde(rename = "tokenUrl")]
    pub token_url: String,
    pub endpoint: String,
    #[serde(rename = "testpath")]
    pub test_path: String,
    pub uid: String,
    pub secret: String,
    pub scope: String,
}

/// Rendering inputs. Schedule fields use -1 for "not rendered".
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub event_id: i64,
    pub exam_id: i64,
    pub csv_path: PathBuf,
    #[serde(rename = "CSVPath")]
    pub csv_path_legacy: PathBuf,
    pub pdf_template_image: PathBuf,
    pub output_folder: PathBuf,
    #[serde(rename = "pageLayout")]
    pub page_layout_path: PathBuf,

    pub landscape: bool,

    pub theme_objet: String,
    pub intitule: String,
    pub fonds_concerne: String,

    pub event_hour_duration: i32,
    pub event_days_duration: i32,

    pub morning_start_at_hour: i32,
    pub morning_start_at_minute: i32,
    pub morning_end_at_hour: i32,
    pub morning_end_at_minute: i32,

    pub afternoon_start_at_hour: i32,
    pub afternoon_start_at_minute: i32,
    pub afternoon_end_at_hour: i32,
    pub afternoon_end_at_minute: i32,

    pub comment: String,
    pub teacher_first_name: String,
    pub teacher_last_name: String,
    pub date_string: String,
    #[serde(rename = "student_name_max_width_mm")]
    pub student_name_max_mm: f32,
    #[serde(rename = "student_name_min_font_pt")]
    pub student_name_min_pt: f32,

    pub time_zone: String,

    pub font: FontConfig,
    #[serde(rename = "42API")]
    pub api: ApiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            event_id: 0,
            exam_id: 0,
            csv_path: PathBuf::new(),
            csv_path_legacy: PathBuf::new(),
            pdf_template_image: PathBuf::new(),
            output_folder: PathBuf::from("output"),
            page_layout_path: PathBuf::new(),
            landscape: false,
            theme_objet: String::new(),
            intitule: String::new(),
            fonds_concerne: String::new(),
            event_hour_duration: ABSENT,
            event_days_duration: ABSENT,
            morning_start_at_hour: ABSENT,
            morning_start_at_minute: ABSENT,
            morning_end_at_hour: ABSENT,
            morning_end_at_minute: ABSENT,
            afternoon_start_at_hour: ABSENT,
            afternoon_start_at_minute: ABSENT,
            afternoon_end_at_hour: ABSENT,
            afternoon_end_at_minute: ABSENT,
            comment: String::new(),
            teacher_first_name: String::new(),
            teacher_last_name: String::new(),
            date_string: String::new(),
            student_name_max_mm: 0.0,
            student_name_min_pt: 0.0,
            time_zone: DEFAULT_TIME_ZONE.to_string(),
            font: FontConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

pub fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

/// Normalized names of the keys present in the user's config file.
/// Derived values never replace these.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideSet(HashSet<String>);

impl OverrideSet {
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(&normalize_key(key))
    }
}

impl<S: AsRef<str>> FromIterator<S> for OverrideSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        OverrideSet(iter.into_iter().map(|k| normalize_key(k.as_ref())).collect())
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<(Config, OverrideSet), AppError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::ConfigError(format!("{}: {}", path.display(), e)))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<(Config, OverrideSet), AppError> {
        let raw: serde_yaml::Value = serde_yaml::from_str(content)
            .map_err(|e| AppError::ConfigError(format!("Invalid YAML: {}", e)))?;
        let overrides: OverrideSet = match &raw {
            serde_yaml::Value::Mapping(map) => map.keys().filter_map(|k| k.as_str()).collect(),
            _ => OverrideSet::default(),
        };

        let mut config: Config = serde_yaml::from_value(raw)
            .map_err(|e| AppError::ConfigError(format!("Invalid config: {}", e)))?;
        if config.csv_path.as_os_str().is_empty() && !config.csv_path_legacy.as_os_str().is_empty() {
            config.csv_path = config.csv_path_legacy.clone();
        }

        log::debug!("Config keys set by the user: {:?}", overrides);
        Ok((config, overrides))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
event_id: 12345
pdf_template_image: templates/emargement.pdf
output_folder: out
pageLayout: layouts/page.yml
landscape: true
Comment: "Salle 3"
teacher_first_name: jean
teacher_last_name: dupont
morning_start_at_hour: 9
font:
  name: DejaVu
  path: fonts/DejaVuSans.ttf
  size: 10
42API:
  tokenUrl: https://api.intra.42.fr/oauth/token
  endpoint: https://api.intra.42.fr/v2
  uid: abc
  secret: def
"#;

    #[test]
    fn parses_fields_and_renamed_keys() {
        let (config, _) = Config::parse(SAMPLE).unwrap();
        assert_eq!(config.event_id, 12345);
        assert_eq!(config.page_layout_path, PathBuf::from("layouts/page.yml"));
        assert!(config.landscape);
        assert_eq!(config.morning_start_at_hour, 9);
        assert_eq!(config.morning_end_at_hour, ABSENT);
        assert_eq!(config.font.size, 10.0);
        assert_eq!(config.api.token_url, "https://api.intra.42.fr/oauth/token");
        assert_eq!(config.api.scope, "");
        assert_eq!(config.time_zone, DEFAULT_TIME_ZONE);
    }

    #[test]
    fn override_set_holds_normalized_top_level_keys() {
        let (_, overrides) = Config::parse(SAMPLE).unwrap();
        assert!(overrides.contains("event_id"));
        assert!(overrides.contains("morning_start_at_hour"));
        assert!(overrides.contains("MORNING_START_AT_HOUR "));
        // Normalized from "Comment"
        assert!(overrides.contains("comment"));
        assert!(overrides.contains("42api"));
        assert!(!overrides.contains("date_string"));
        // Nested keys are not top-level overrides
        assert!(!overrides.contains("size"));
    }

    #[test]
    fn legacy_csv_key_is_used_when_csv_path_is_empty() {
        let (config, _) = Config::parse("CSVPath: students.csv\n").unwrap();
        assert_eq!(config.csv_path, PathBuf::from("students.csv"));

        let (config, _) = Config::parse("CSVPath: old.csv\ncsv_path: new.csv\n").unwrap();
        assert_eq!(config.csv_path, PathBuf::from("new.csv"));
    }

    #[test]
    fn empty_document_uses_defaults() {
        let (config, overrides) = Config::parse("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(overrides, OverrideSet::default());
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let err = Config::parse("event_id: [1, 2").unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
        let err = Config::parse("event_id: not-a-number\n").unwrap_err();
        assert!(matches!(err, AppError::ConfigError(_)));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Config::load(Path::new("nope/config.yml")).is_err());
    }
}
