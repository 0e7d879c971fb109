use crate::constants::ITALIAN_MONTHS;
use crate::error::{ConfigError, DateError};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static SINGLE_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([0-9]{1,2}) (\p{L}{3})$").unwrap());

static DATE_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i:dal) ([0-9]{1,2}) (\p{L}{3}) (?i:al) ([0-9]{1,2}) (\p{L}{3})$").unwrap()
});

/// Rewrites Italian short dates into `day/month` form.
///
/// `"5 Mar"` becomes `"5/03"`, `"Dal 2 Apr Al 10 Apr"` becomes `"Dal 2/04 al 10/04"`.
/// Text matching neither shape comes back unchanged.
#[derive(Debug, Clone)]
pub struct DateNormalizer {
    // keyed by lowercase abbreviation
    months: HashMap<String, u32>,
}

impl Default for DateNormalizer {
    fn default() -> Self {
        let months = ITALIAN_MONTHS
            .iter()
            .map(|(abbr, n)| (abbr.to_lowercase(), *n))
            .collect();
        Self { months }
    }
}

impl DateNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a normalizer from a custom month table.
    ///
    /// Abbreviations must be unique and together cover months 1 through 12; aliases are allowed.
    pub fn with_months<S: AsRef<str>>(table: &[(S, u32)]) -> Result<Self, ConfigError> {
        let mut months = HashMap::new();
        for (abbr, number) in table {
            let abbr = abbr.as_ref();
            if !(1..=12).contains(number) {
                return Err(ConfigError::InvalidMonthNumber {
                    abbreviation: abbr.to_string(),
                    number: *number,
                });
            }
            if months.insert(abbr.to_lowercase(), *number).is_some() {
                return Err(ConfigError::DuplicateMonth {
                    abbreviation: abbr.to_string(),
                });
            }
        }

        let missing: Vec<u32> = (1..=12)
            .filter(|m| !months.values().any(|v| v == m))
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::IncompleteMonthTable { missing });
        }

        Ok(Self { months })
    }

    pub fn normalize(&self, raw: &str) -> Result<String, DateError> {
        let collapsed = WHITESPACE.replace_all(raw.trim(), " ");

        if let Some(caps) = SINGLE_DATE.captures(&collapsed) {
            return self.day_month(&caps, 1, raw);
        }

        if let Some(caps) = DATE_RANGE.captures(&collapsed) {
            let start = self.day_month(&caps, 1, raw)?;
            let end = self.day_month(&caps, 3, raw)?;
            return Ok(format!("Dal {start} al {end}"));
        }

        Ok(raw.to_string())
    }

    fn day_month(&self, caps: &Captures<'_>, first: usize, raw: &str) -> Result<String, DateError> {
        let day: u32 = caps[first].parse().unwrap_or_default();
        let abbr = &caps[first + 1];
        let month = self
            .months
            .get(&abbr.to_lowercase())
            .ok_or_else(|| DateError::UnknownMonth {
                abbreviation: abbr.to_string(),
                raw: raw.to_string(),
            })?;
        Ok(format!("{day}/{month:02}"))
    }
}
