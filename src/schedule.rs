// Derivation of date, duration and morning/afternoon time slots from an
// event's or exam's begin/end instants.

use crate::config::{Config, OverrideSet};
use crate::error::AppError;
use crate::intra::ApiItem;
use crate::source::ItemKind;
use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDateTime, Timelike};
use chrono_tz::Tz;

/// Sentinel for a schedule field that must not be rendered
pub const ABSENT: i32 = -1;

/// Funding label written on every API-sourced sheet
pub const FONDS_CONCERNE: &str = "FSE+";

pub const EVENT_PREFIX: &str = "Event";
pub const EXAM_PREFIX: &str = "Exam Stud";

const NOON_HOUR: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    pub start_hour: i32,
    pub start_minute: i32,
    pub end_hour: i32,
    pub end_minute: i32,
}

impl TimeSlot {
    pub const ABSENT: TimeSlot = TimeSlot {
        start_hour: ABSENT,
        start_minute: ABSENT,
        end_hour: ABSENT,
        end_minute: ABSENT,
    };

    pub fn new(start_hour: i32, start_minute: i32, end_hour: i32, end_minute: i32) -> Self {
        TimeSlot {
            start_hour,
            start_minute,
            end_hour,
            end_minute,
        }
    }

    fn between(begin: NaiveDateTime, end: NaiveDateTime) -> Self {
        TimeSlot::new(
            begin.hour() as i32,
            begin.minute() as i32,
            end.hour() as i32,
            end.minute() as i32,
        )
    }

    #[cfg(test)]
    pub fn is_absent(&self) -> bool {
        *self == TimeSlot::ABSENT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaySplit {
    pub morning: TimeSlot,
    pub afternoon: TimeSlot,
}

impl DaySplit {
    pub const ABSENT: DaySplit = DaySplit {
        morning: TimeSlot::ABSENT,
        afternoon: TimeSlot::ABSENT,
    };
}

/// Time zone the API instants are displayed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Zone {
    Named(Tz),
    Local,
}

impl Zone {
    /// Look up an IANA zone name, falling back to the local zone.
    pub fn from_name(name: &str) -> Self {
        match name.trim().parse::<Tz>() {
            Ok(tz) => Zone::Named(tz),
            Err(_) => {
                log::warn!("Unknown time zone '{}', using the local zone", name);
                Zone::Local
            }
        }
    }

    pub fn wall_clock(&self, instant: DateTime<FixedOffset>) -> NaiveDateTime {
        match self {
            Zone::Named(tz) => instant.with_timezone(tz).naive_local(),
            Zone::Local => instant.with_timezone(&Local).naive_local(),
        }
    }
}

/// Parse an RFC 3339 timestamp, with or without fractional seconds.
pub fn parse_api_time(value: &str) -> Result<DateTime<FixedOffset>, AppError> {
    if value.is_empty() {
        return Err(AppError::TimeError("empty time value".to_string()));
    }
    DateTime::parse_from_rfc3339(value)
        .map_err(|_| AppError::TimeError(format!("unsupported time format: {}", value)))
}

/// Rounded hours and whole days covered by an elapsed time.
///
/// Takes the difference of real instants, so clock changes do not skew it.
pub fn durations(elapsed: Duration) -> (i32, i32) {
    let hours = (elapsed.num_seconds() as f64 / 3600.0).max(0.0);
    let mut days = (hours / 24.0).ceil() as i32;
    if days == 0 && hours > 0.0 {
        days = 1;
    }
    (hours.round() as i32, days)
}

/// Split an event interval at local noon of the begin day.
pub fn split_by_noon(begin: NaiveDateTime, end: NaiveDateTime) -> DaySplit {
    if end < begin {
        return DaySplit::ABSENT;
    }
    let Some(noon) = begin.date().and_hms_opt(NOON_HOUR, 0, 0) else {
        return DaySplit::ABSENT;
    };

    if end <= noon {
        return DaySplit {
            morning: TimeSlot::between(begin, end),
            afternoon: TimeSlot::ABSENT,
        };
    }
    if begin >= noon {
        return DaySplit {
            morning: TimeSlot::ABSENT,
            afternoon: TimeSlot::between(begin, end),
        };
    }
    DaySplit {
        morning: TimeSlot::between(begin, noon),
        afternoon: TimeSlot::between(noon, end),
    }
}

/// Exams are bucketed whole by their begin hour and never straddle noon.
pub fn split_exam(begin: NaiveDateTime, end: NaiveDateTime) -> DaySplit {
    let slot = TimeSlot::between(begin, end);
    if begin.hour() < NOON_HOUR {
        DaySplit {
            morning: slot,
            afternoon: TimeSlot::ABSENT,
        }
    } else {
        DaySplit {
            morning: TimeSlot::ABSENT,
            afternoon: slot,
        }
    }
}

/// Values computed from the attendee source. `None` leaves the config as is.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Derived {
    pub date_string: Option<String>,
    pub theme_objet: Option<String>,
    pub fonds_concerne: Option<String>,
    pub comment: Option<String>,
    pub intitule: Option<String>,
    pub event_hour_duration: Option<i32>,
    pub event_days_duration: Option<i32>,
    pub morning: Option<TimeSlot>,
    pub afternoon: Option<TimeSlot>,
}

impl Derived {
    /// CSV runs have no timing information: every schedule field is absent.
    pub fn custom() -> Self {
        Derived {
            event_hour_duration: Some(ABSENT),
            event_days_duration: Some(ABSENT),
            morning: Some(TimeSlot::ABSENT),
            afternoon: Some(TimeSlot::ABSENT),
            ..Derived::default()
        }
    }

    /// Compute everything an event or exam contributes to the sheet.
    ///
    /// `user_date` is the user's own date string when they set one; the theme
    /// then quotes it instead of the computed date.
    pub fn from_item(
        kind: ItemKind,
        item: &ApiItem,
        zone: &Zone,
        user_date: Option<&str>,
    ) -> Result<Self, AppError> {
        let begin_instant = parse_api_time(&item.begin_at)?;
        let end_instant = parse_api_time(&item.end_at)?;
        let begin = zone.wall_clock(begin_instant);
        let end = zone.wall_clock(end_instant);

        let computed_date = begin.format("%d/%m/%Y").to_string();
        let theme_date = user_date.unwrap_or(computed_date.as_str());
        let (hours, days) = durations(end_instant - begin_instant);

        let (prefix, comment, intitule, split) = match kind {
            ItemKind::Event => (
                EVENT_PREFIX,
                item.location.clone(),
                Some(item.name.clone()),
                split_by_noon(begin, end),
            ),
            ItemKind::Exam => (
                EXAM_PREFIX,
                format!("{} {}", EXAM_PREFIX, item.location),
                None,
                split_exam(begin, end),
            ),
        };

        log::debug!(
            "Derived {} to {}: {}h over {} day(s), {:?}",
            begin,
            end,
            hours,
            days,
            split
        );

        Ok(Derived {
            theme_objet: Some(format!("{} {}", prefix, theme_date)),
            date_string: Some(computed_date),
            fonds_concerne: Some(FONDS_CONCERNE.to_string()),
            comment: Some(comment),
            intitule,
            event_hour_duration: Some(hours),
            event_days_duration: Some(days),
            morning: Some(split.morning),
            afternoon: Some(split.afternoon),
        })
    }
}

fn assign<T>(overrides: &OverrideSet, key: &str, field: &mut T, value: Option<T>) {
    if let Some(value) = value {
        if overrides.contains(key) {
            log::debug!("Keeping user value for '{}'", key);
        } else {
            *field = value;
        }
    }
}

/// Fold derived values into `config`, skipping every key the user set.
pub fn merge(mut config: Config, overrides: &OverrideSet, derived: Derived) -> Config {
    let o = overrides;
    assign(o, "date_string", &mut config.date_string, derived.date_string);
    assign(o, "theme_objet", &mut config.theme_objet, derived.theme_objet);
    assign(o, "fonds_concerne", &mut config.fonds_concerne, derived.fonds_concerne);
    assign(o, "comment", &mut config.comment, derived.comment);
    assign(o, "intitule", &mut config.intitule, derived.intitule);
    assign(o, "event_hour_duration", &mut config.event_hour_duration, derived.event_hour_duration);
    assign(o, "event_days_duration", &mut config.event_days_duration, derived.event_days_duration);

    let morning = derived.morning;
    assign(o, "morning_start_at_hour", &mut config.morning_start_at_hour, morning.map(|s| s.start_hour));
    assign(o, "morning_start_at_minute", &mut config.morning_start_at_minute, morning.map(|s| s.start_minute));
    assign(o, "morning_end_at_hour", &mut config.morning_end_at_hour, morning.map(|s| s.end_hour));
    assign(o, "morning_end_at_minute", &mut config.morning_end_at_minute, morning.map(|s| s.end_minute));

    let afternoon = derived.afternoon;
    assign(o, "afternoon_start_at_hour", &mut config.afternoon_start_at_hour, afternoon.map(|s| s.start_hour));
    assign(o, "afternoon_start_at_minute", &mut config.afternoon_start_at_minute, afternoon.map(|s| s.start_minute));
    assign(o, "afternoon_end_at_hour", &mut config.afternoon_end_at_hour, afternoon.map(|s| s.end_hour));
    assign(o, "afternoon_end_at_minute", &mut config.afternoon_end_at_minute, afternoon.map(|s| s.end_minute));

    config
}

/// Derive from an API item and merge in one step.
pub fn apply_item(
    config: Config,
    overrides: &OverrideSet,
    kind: ItemKind,
    item: &ApiItem,
) -> Result<Config, AppError> {
    let zone = Zone::from_name(&config.time_zone);
    let user_date = overrides
        .contains("date_string")
        .then_some(config.date_string.as_str());
    let derived = Derived::from_item(kind, item, &zone, user_date)?;
    Ok(merge(config, overrides, derived))
}

pub fn apply_custom(config: Config, overrides: &OverrideSet) -> Config {
    merge(config, overrides, Derived::custom())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 15)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn item(begin: &str, end: &str) -> ApiItem {
        ApiItem {
            name: "Piscine C4".to_string(),
            begin_at: begin.to_string(),
            end_at: end.to_string(),
            location: "Paris - Cluster 1".to_string(),
        }
    }

    fn paris() -> Zone {
        Zone::from_name("Europe/Paris")
    }

    fn slots(config: &Config) -> [i32; 8] {
        [
            config.morning_start_at_hour,
            config.morning_start_at_minute,
            config.morning_end_at_hour,
            config.morning_end_at_minute,
            config.afternoon_start_at_hour,
            config.afternoon_start_at_minute,
            config.afternoon_end_at_hour,
            config.afternoon_end_at_minute,
        ]
    }

    #[test]
    fn parses_with_and_without_fraction() {
        assert!(parse_api_time("2025-01-15T08:00:00Z").is_ok());
        assert!(parse_api_time("2025-01-15T08:00:00.123Z").is_ok());
        assert!(parse_api_time("2025-01-15T08:00:00+01:00").is_ok());
        assert!(matches!(parse_api_time(""), Err(AppError::TimeError(_))));
        assert!(matches!(parse_api_time("15/01/2025"), Err(AppError::TimeError(_))));
    }

    #[test]
    fn zone_conversion_and_fallback() {
        let instant = parse_api_time("2025-01-15T08:00:00Z").unwrap();
        assert_eq!(paris().wall_clock(instant), at(9, 0));
        assert_eq!(Zone::from_name("Mars/Olympus"), Zone::Local);
    }

    #[test]
    fn durations_round_hours_and_count_days() {
        assert_eq!(durations(at(16, 30) - at(9, 0)), (8, 1));
        assert_eq!(durations(at(11, 0) - at(8, 0)), (3, 1));
        assert_eq!(durations(at(9, 10) - at(9, 0)), (0, 1));
        assert_eq!(durations(at(9, 0) - at(9, 0)), (0, 0));
        assert_eq!(durations(at(9, 0) - at(16, 0)), (0, 0));
        assert_eq!(durations(Duration::hours(50)), (50, 3));
    }

    #[test]
    fn hours_count_real_time_across_clock_changes() {
        // Four real hours, shown as 01:00-06:00 in Paris when clocks go forward
        let spring = Derived::from_item(
            ItemKind::Event,
            &item("2025-03-30T00:00:00Z", "2025-03-30T04:00:00Z"),
            &paris(),
            None,
        )
        .unwrap();
        assert_eq!(spring.event_hour_duration, Some(4));

        // Four real hours, shown as 00:00-03:00 in Paris when clocks go back
        let autumn = Derived::from_item(
            ItemKind::Event,
            &item("2025-10-25T22:00:00Z", "2025-10-26T02:00:00Z"),
            &paris(),
            None,
        )
        .unwrap();
        assert_eq!(autumn.event_hour_duration, Some(4));
        assert_eq!(autumn.event_days_duration, Some(1));
        assert_eq!(autumn.date_string.as_deref(), Some("26/10/2025"));
    }

    #[test]
    fn noon_split_straddling() {
        let split = split_by_noon(at(9, 0), at(16, 30));
        assert_eq!(split.morning, TimeSlot::new(9, 0, 12, 0));
        assert_eq!(split.afternoon, TimeSlot::new(12, 0, 16, 30));
        assert_eq!(
            (split.morning.end_hour, split.morning.end_minute),
            (split.afternoon.start_hour, split.afternoon.start_minute)
        );
    }

    #[test]
    fn noon_split_one_sided() {
        let morning = split_by_noon(at(8, 15), at(12, 0));
        assert_eq!(morning.morning, TimeSlot::new(8, 15, 12, 0));
        assert!(morning.afternoon.is_absent());

        let afternoon = split_by_noon(at(12, 0), at(17, 45));
        assert!(afternoon.morning.is_absent());
        assert_eq!(afternoon.afternoon, TimeSlot::new(12, 0, 17, 45));
    }

    #[test]
    fn noon_split_reversed_interval_is_absent() {
        assert_eq!(split_by_noon(at(15, 0), at(9, 0)), DaySplit::ABSENT);
    }

    #[test]
    fn exam_uses_begin_hour_only() {
        let split = split_exam(at(8, 0), at(11, 0));
        assert_eq!(split.morning, TimeSlot::new(8, 0, 11, 0));
        assert!(split.afternoon.is_absent());

        // Straddles noon but is not split
        let split = split_exam(at(10, 0), at(14, 0));
        assert_eq!(split.morning, TimeSlot::new(10, 0, 14, 0));
        assert!(split.afternoon.is_absent());

        let split = split_exam(at(13, 30), at(16, 30));
        assert!(split.morning.is_absent());
        assert_eq!(split.afternoon, TimeSlot::new(13, 30, 16, 30));
    }

    #[test]
    fn event_scenario() {
        let mut config = Config::default();
        config.time_zone = "Europe/Paris".to_string();
        let config = apply_item(
            config,
            &OverrideSet::default(),
            ItemKind::Event,
            &item("2025-01-15T08:00:00.000Z", "2025-01-15T15:30:00.000Z"),
        )
        .unwrap();

        assert_eq!(config.event_hour_duration, 8);
        assert_eq!(config.event_days_duration, 1);
        assert_eq!(slots(&config), [9, 0, 12, 0, 12, 0, 16, 30]);
        assert_eq!(config.date_string, "15/01/2025");
        assert_eq!(config.theme_objet, "Event 15/01/2025");
        assert_eq!(config.fonds_concerne, FONDS_CONCERNE);
        assert_eq!(config.comment, "Paris - Cluster 1");
        assert_eq!(config.intitule, "Piscine C4");
    }

    #[test]
    fn exam_scenario() {
        let mut config = Config::default();
        config.intitule = "Kept".to_string();
        let config = apply_item(
            config,
            &OverrideSet::default(),
            ItemKind::Exam,
            &item("2025-01-15T08:00:00+01:00", "2025-01-15T11:00:00+01:00"),
        )
        .unwrap();

        assert_eq!(slots(&config), [8, 0, 11, 0, -1, -1, -1, -1]);
        assert_eq!(config.event_hour_duration, 3);
        assert_eq!(config.comment, "Exam Stud Paris - Cluster 1");
        assert_eq!(config.theme_objet, "Exam Stud 15/01/2025");
        // Only events fill the title
        assert_eq!(config.intitule, "Kept");
    }

    #[test]
    fn overrides_win_over_derived_values() {
        let keys = [
            "date_string",
            "theme_objet",
            "fonds_concerne",
            "comment",
            "intitule",
            "event_hour_duration",
            "event_days_duration",
            "morning_start_at_hour",
            "morning_start_at_minute",
            "morning_end_at_hour",
            "morning_end_at_minute",
            "afternoon_start_at_hour",
            "afternoon_start_at_minute",
            "afternoon_end_at_hour",
            "afternoon_end_at_minute",
        ];
        let overrides: OverrideSet = keys.iter().collect();

        let mut before = Config::default();
        before.date_string = "01/02/2025".to_string();
        before.theme_objet = "Mon thème".to_string();
        before.fonds_concerne = "FEDER".to_string();
        before.comment = "Salle 3".to_string();
        before.intitule = "Atelier".to_string();
        before.event_hour_duration = 2;
        before.event_days_duration = 4;
        before.morning_start_at_hour = 7;
        before.morning_start_at_minute = 5;
        before.morning_end_at_hour = 10;
        before.morning_end_at_minute = 50;
        before.afternoon_start_at_hour = 13;
        before.afternoon_start_at_minute = 15;
        before.afternoon_end_at_hour = 18;
        before.afternoon_end_at_minute = 45;

        for kind in [ItemKind::Event, ItemKind::Exam] {
            let after = apply_item(
                before.clone(),
                &overrides,
                kind,
                &item("2025-01-15T08:00:00Z", "2025-01-15T15:30:00Z"),
            )
            .unwrap();
            assert_eq!(after, before);
        }
        assert_eq!(apply_custom(before.clone(), &overrides), before);
    }

    #[test]
    fn theme_quotes_the_users_date() {
        let overrides: OverrideSet = ["date_string"].iter().collect();
        let mut config = Config::default();
        config.date_string = "Lundi 3".to_string();
        let config = apply_item(
            config,
            &overrides,
            ItemKind::Event,
            &item("2025-01-15T08:00:00Z", "2025-01-15T09:00:00Z"),
        )
        .unwrap();
        assert_eq!(config.date_string, "Lundi 3");
        assert_eq!(config.theme_objet, "Event Lundi 3");
    }

    #[test]
    fn partial_override_keeps_only_that_field() {
        let overrides: OverrideSet = ["morning_end_at_hour"].iter().collect();
        let mut config = Config::default();
        config.morning_end_at_hour = 11;
        let config = apply_item(
            config,
            &overrides,
            ItemKind::Event,
            &item("2025-01-15T08:00:00Z", "2025-01-15T15:30:00Z"),
        )
        .unwrap();
        assert_eq!(slots(&config), [9, 0, 11, 0, 12, 0, 16, 30]);
    }

    #[test]
    fn custom_runs_blank_the_schedule() {
        let mut config = Config::default();
        config.event_hour_duration = 6;
        config.morning_start_at_hour = 9;
        config.comment = "Libre".to_string();
        let config = apply_custom(config, &OverrideSet::default());
        assert_eq!(config.event_hour_duration, ABSENT);
        assert_eq!(config.event_days_duration, ABSENT);
        assert_eq!(slots(&config), [ABSENT; 8]);
        assert_eq!(config.comment, "Libre");
    }

    #[test]
    fn bad_timestamps_fail_the_derivation() {
        let result = apply_item(
            Config::default(),
            &OverrideSet::default(),
            ItemKind::Event,
            &item("", "2025-01-15T15:30:00Z"),
        );
        assert!(matches!(result, Err(AppError::TimeError(_))));

        let result = apply_item(
            Config::default(),
            &OverrideSet::default(),
            ItemKind::Exam,
            &item("2025-01-15T08:00:00Z", "tomorrow"),
        );
        assert!(matches!(result, Err(AppError::TimeError(_))));
    }
}
