//! Uptime since the site went live.
//!
//! Always derived from the epoch and the current time, never accumulated,
//! so a paused ticker needs no catch-up when it resumes.

use crate::i18n::Language;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// `2025-06-21T00:00:00Z`, the day the site went live.
pub const SITE_EPOCH_SECS: i64 = 1_750_464_000;

pub fn site_epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(SITE_EPOCH_SECS, 0).unwrap_or_default()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UptimeSnapshot {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
    pub total_days: u64,
    pub total_hours: u64,
    pub total_minutes: u64,
    pub total_seconds: u64,
}

impl UptimeSnapshot {
    /// Elapsed time from `epoch` to `now`. A clock behind the epoch reads
    /// as zero.
    pub fn between(epoch: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let total_seconds = u64::try_from((now - epoch).num_seconds()).unwrap_or(0);
        Self::from_seconds(total_seconds)
    }

    pub fn from_seconds(total_seconds: u64) -> Self {
        let total_minutes = total_seconds / 60;
        let total_hours = total_minutes / 60;
        let total_days = total_hours / 24;
        Self {
            days: total_days,
            hours: total_hours % 24,
            minutes: total_minutes % 60,
            seconds: total_seconds % 60,
            total_days,
            total_hours,
            total_minutes,
            total_seconds,
        }
    }

    /// Day/hour/minute for long uptimes, minute/second for short ones.
    pub fn format(&self, lang: Language) -> String {
        let Self {
            days: d,
            hours: h,
            minutes: m,
            seconds: s,
            ..
        } = *self;
        match lang {
            Language::En if d > 0 => format!("{d}d {h}h {m}m"),
            Language::En if h > 0 => format!("{h}h {m}m"),
            Language::En => format!("{m}m {s}s"),
            Language::ZhCn if d > 0 => format!("{d}天 {h}小时 {m}分钟"),
            Language::ZhCn if h > 0 => format!("{h}小时 {m}分钟"),
            Language::ZhCn => format!("{m}分钟 {s}秒"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_epoch_constant() {
        assert_eq!(
            site_epoch(),
            Utc.with_ymd_and_hms(2025, 6, 21, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_between_splits_components() {
        let now = site_epoch() + chrono::Duration::seconds(3 * 86_400 + 4 * 3_600 + 5 * 60 + 6);
        let up = UptimeSnapshot::between(site_epoch(), now);
        assert_eq!((up.days, up.hours, up.minutes, up.seconds), (3, 4, 5, 6));
        assert_eq!(up.total_hours, 76);
        assert_eq!(up.total_minutes, 76 * 60 + 5);
    }

    #[test]
    fn test_clock_before_epoch_is_zero() {
        let now = site_epoch() - chrono::Duration::hours(1);
        assert_eq!(UptimeSnapshot::between(site_epoch(), now), UptimeSnapshot::default());
    }

    #[test]
    fn test_format_templates() {
        let long = UptimeSnapshot::from_seconds(2 * 86_400 + 3 * 3_600 + 4 * 60);
        assert_eq!(long.format(Language::En), "2d 3h 4m");
        assert_eq!(long.format(Language::ZhCn), "2天 3小时 4分钟");

        let medium = UptimeSnapshot::from_seconds(5 * 3_600 + 7 * 60 + 9);
        assert_eq!(medium.format(Language::En), "5h 7m");
        assert_eq!(medium.format(Language::ZhCn), "5小时 7分钟");

        let short = UptimeSnapshot::from_seconds(12 * 60 + 34);
        assert_eq!(short.format(Language::En), "12m 34s");
        assert_eq!(short.format(Language::ZhCn), "12分钟 34秒");
    }

    #[test]
    fn test_serializes_camel_case() {
        let json = serde_json::to_value(UptimeSnapshot::from_seconds(61)).unwrap();
        assert_eq!(json["totalSeconds"], 61);
        assert_eq!(json["minutes"], 1);
    }
}
