// Where the attendee list comes from

use crate::config::Config;
use crate::error::AppError;
use std::path::{Path, PathBuf};

/// Kind of 42 intranet item a run is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Event,
    Exam,
}

impl ItemKind {
    pub fn item_path(&self, id: u64) -> String {
        match self {
            ItemKind::Event => format!("/events/{}", id),
            ItemKind::Exam => format!("/exams/{}", id),
        }
    }

    pub fn users_path(&self, id: u64) -> String {
        match self {
            ItemKind::Event => format!("/events/{}/events_users", id),
            ItemKind::Exam => format!("/exams/{}/exams_users", id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Custom { csv_path: PathBuf },
    Event(u64),
    Exam(u64),
}

impl Source {
    /// A CSV path wins over an exam id, which wins over an event id.
    pub fn determine(config: &Config) -> Result<Source, AppError> {
        if !config.csv_path.as_os_str().is_empty() {
            return Ok(Source::Custom {
                csv_path: config.csv_path.clone(),
            });
        }
        if config.exam_id > 0 {
            return Ok(Source::Exam(config.exam_id as u64));
        }
        if config.event_id > 0 {
            return Ok(Source::Event(config.event_id as u64));
        }
        Err(AppError::SourceError(
            "missing attendee source: set csv_path, exam_id, or event_id".to_string(),
        ))
    }

    pub fn api_target(&self) -> Option<(ItemKind, u64)> {
        match self {
            Source::Custom { .. } => None,
            Source::Event(id) => Some((ItemKind::Event, *id)),
            Source::Exam(id) => Some((ItemKind::Exam, *id)),
        }
    }

    pub fn csv_path(&self) -> Option<&Path> {
        match self {
            Source::Custom { csv_path } => Some(csv_path),
            Source::Event(_) | Source::Exam(_) => None,
        }
    }

    pub fn no_attendees_message(&self) -> String {
        match self {
            Source::Custom { csv_path } => {
                format!("no attendees found in CSV: {}", csv_path.display())
            }
            Source::Event(id) => format!("no attendees found for event {}", id),
            Source::Exam(id) => format!("no attendees found for exam {}", id),
        }
    }

    /// File name of the combined document, e.g. `event_42_15-01-2025.pdf`.
    pub fn combined_output_name(&self, date_string: &str) -> String {
        let date_part = sanitize_filename_part(date_string);
        let dated = |prefix: &str, id: u64| {
            let date_part = if date_part.is_empty() {
                "unknown-date"
            } else {
                date_part.as_str()
            };
            format!("{}_{}_{}.pdf", prefix, id, date_part)
        };
        match self {
            Source::Exam(id) => dated("exam", *id),
            Source::Event(id) => dated("event", *id),
            Source::Custom { .. } if date_part.is_empty() => "custom.pdf".to_string(),
            Source::Custom { .. } => format!("custom_{}.pdf", date_part),
        }
    }
}

pub fn sanitize_filename_part(value: &str) -> String {
    value
        .trim()
        .replace(['/', '\\', ':'], "-")
        .replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_path_takes_precedence() {
        let mut config = Config::default();
        config.event_id = 3;
        config.exam_id = 4;
        config.csv_path = PathBuf::from("list.csv");
        assert_eq!(
            Source::determine(&config).unwrap(),
            Source::Custom {
                csv_path: PathBuf::from("list.csv")
            }
        );

        config.csv_path = PathBuf::new();
        assert_eq!(Source::determine(&config).unwrap(), Source::Exam(4));

        config.exam_id = 0;
        assert_eq!(Source::determine(&config).unwrap(), Source::Event(3));
    }

    #[test]
    fn no_source_is_an_error() {
        let mut config = Config::default();
        config.event_id = -2;
        assert!(matches!(
            Source::determine(&config),
            Err(AppError::SourceError(_))
        ));
    }

    #[test]
    fn api_paths() {
        assert_eq!(ItemKind::Event.item_path(7), "/events/7");
        assert_eq!(ItemKind::Exam.item_path(7), "/exams/7");
        assert_eq!(ItemKind::Event.users_path(7), "/events/7/events_users");
        assert_eq!(ItemKind::Exam.users_path(7), "/exams/7/exams_users");
        assert_eq!(Source::Exam(9).api_target(), Some((ItemKind::Exam, 9)));
        assert_eq!(
            Source::Custom {
                csv_path: PathBuf::from("a.csv")
            }
            .api_target(),
            None
        );
    }

    #[test]
    fn combined_names() {
        assert_eq!(
            Source::Event(42).combined_output_name("15/01/2025"),
            "event_42_15-01-2025.pdf"
        );
        assert_eq!(
            Source::Exam(7).combined_output_name(""),
            "exam_7_unknown-date.pdf"
        );
        let custom = Source::Custom {
            csv_path: PathBuf::from("a.csv"),
        };
        assert_eq!(custom.combined_output_name("  "), "custom.pdf");
        assert_eq!(
            custom.combined_output_name(" 3 mars 2025 10:00 "),
            "custom_3_mars_2025_10-00.pdf"
        );
    }

    #[test]
    fn sanitizes_separators() {
        assert_eq!(sanitize_filename_part(r"a/b\c:d e"), "a-b-c-d_e");
    }
}
