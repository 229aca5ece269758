//! Run times and the set of files a run retrieves.

use std::fmt;
use std::ops::{Range, RangeInclusive};
use std::str::FromStr;

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Timelike, Utc};
use ingestion::ProductNaming;

use crate::config::{ConfigError, SourceConfig};

/// ICON-D2 runs every three hours.
pub const RUN_INTERVAL_HOURS: u32 = 3;

/// Model reference time of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct RunTime {
    date: NaiveDate,
    hour: u32,
}

impl RunTime {
    pub fn new(date: NaiveDate, hour: u32) -> Result<Self, ConfigError> {
        if hour > 23 || hour % RUN_INTERVAL_HOURS != 0 {
            return Err(ConfigError::InvalidRun(format!(
                "{}{:02}",
                date.format("%Y%m%d"),
                hour
            )));
        }
        Ok(Self { date, hour })
    }

    /// The run to fetch at `now`.
    ///
    /// That is the current UTC hour floored to a multiple of three. Unless
    /// `latest` is set, the run before it is taken, since the newest one is
    /// often not fully published yet.
    pub fn at(now: DateTime<Utc>, latest: bool) -> Self {
        let now = if latest {
            now
        } else {
            now - ChronoDuration::hours(RUN_INTERVAL_HOURS as i64)
        };
        let hour = now.hour() - now.hour() % RUN_INTERVAL_HOURS;
        Self {
            date: now.date_naive(),
            hour,
        }
    }

    #[cfg(test)]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    /// `YYYYMMDDHH`.
    pub fn stamp(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RunTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{:02}", self.date.format("%Y%m%d"), self.hour)
    }
}

impl FromStr for RunTime {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidRun(s.to_string());
        if s.len() != 10 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let date = NaiveDate::parse_from_str(&s[..8], "%Y%m%d").map_err(|_| invalid())?;
        let hour: u32 = s[8..].parse().map_err(|_| invalid())?;
        Self::new(date, hour).map_err(|_| invalid())
    }
}

/// One remote file to retrieve.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RetrievalTarget {
    pub field: String,
    pub forecast_hour: u32,
    pub level: u32,
    pub url: String,
}

impl RetrievalTarget {
    /// Local file name: the last URL segment with spaces replaced.
    pub fn file_name(&self) -> String {
        self.url
            .rsplit('/')
            .next()
            .unwrap_or(&self.url)
            .replace(' ', "_")
    }
}

/// Builds the URLs of one run.
#[derive(Debug, Clone)]
pub struct TargetBuilder {
    base_url: String,
    run: RunTime,
    naming: ProductNaming,
}

impl TargetBuilder {
    pub fn new(source: &SourceConfig, run: RunTime) -> Self {
        Self {
            base_url: source.base_url.trim_end_matches('/').to_string(),
            run,
            naming: ProductNaming::new(&source.file_prefix, &source.model, &run.stamp()),
        }
    }

    pub fn naming(&self) -> &ProductNaming {
        &self.naming
    }

    pub fn url(&self, field: &str, hour: u32, level: u32) -> String {
        format!(
            "{}/{:02}/{}/{}",
            self.base_url,
            self.run.hour(),
            field,
            self.naming.archive_name(hour, level, field)
        )
    }

    /// Every (hour, level) target of one field, hours outer.
    pub fn field_targets(
        &self,
        field: &str,
        hours: RangeInclusive<u32>,
        levels: Range<u32>,
    ) -> Vec<RetrievalTarget> {
        hours
            .flat_map(|hour| levels.clone().map(move |level| (hour, level)))
            .map(|(forecast_hour, level)| RetrievalTarget {
                field: field.to_string(),
                forecast_hour,
                level,
                url: self.url(field, forecast_hour, level),
            })
            .collect()
    }
}
