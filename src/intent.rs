//! Structured recommendation intent.
//!
//! An [`Intent`] is produced per turn by the chat layer and consumed by the
//! retrieval pipeline. Validation happens here, at the boundary: a negative budget or an
//! unknown hunger level is rejected as [`EngineError::InvalidIntent`] and never coerced.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::Category;
use crate::error::EngineError;

/// Offset of the campus wall clock (WIB, UTC+7) in seconds.
const CAMPUS_UTC_OFFSET_SECS: i64 = 7 * 3600;

/// Values strictly below this are read as thousands (`"15"` → 15000).
pub const BUDGET_THOUSANDS_BOUNDARY: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HungerLevel {
    #[serde(alias = "iseng", alias = "cuma_iseng")]
    Light,
    #[serde(alias = "standar", alias = "laper_standar")]
    Standard,
    #[serde(alias = "brutal", alias = "laper_brutal")]
    Heavy,
}

impl HungerLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Standard => "standard",
            Self::Heavy => "heavy",
        }
    }

    /// Menu categories a hunger level is allowed to receive.
    pub fn allowed_categories(&self) -> &'static [Category] {
        match self {
            Self::Heavy => &[Category::HeavyMeal],
            Self::Standard => &[Category::HeavyMeal, Category::LightMeal],
            Self::Light => &[Category::Snack, Category::LightMeal, Category::Drink],
        }
    }
}

impl std::fmt::Display for HungerLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HungerLevel {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" | "iseng" | "cuma_iseng" => Ok(Self::Light),
            "standard" | "standar" | "laper_standar" => Ok(Self::Standard),
            "heavy" | "brutal" | "laper_brutal" => Ok(Self::Heavy),
            other => Err(EngineError::InvalidIntent(format!(
                "unknown hunger level: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimePeriod {
    #[serde(alias = "pagi")]
    Morning,
    #[serde(alias = "siang")]
    Midday,
    #[serde(alias = "sore")]
    Afternoon,
    #[serde(alias = "malam")]
    Evening,
}

impl TimePeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Midday => "midday",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
        }
    }

    /// Bucket an hour of the campus-local day.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=10 => Self::Morning,
            11..=14 => Self::Midday,
            15..=17 => Self::Afternoon,
            _ => Self::Evening,
        }
    }

    /// Derive the period from a UTC instant, shifted to campus time.
    pub fn at(instant: DateTime<Utc>) -> Self {
        let local = instant + Duration::seconds(CAMPUS_UTC_OFFSET_SECS);
        Self::from_hour(local.hour())
    }

    pub fn now() -> Self {
        Self::at(Utc::now())
    }
}

impl std::fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TimePeriod {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "morning" | "pagi" => Ok(Self::Morning),
            "midday" | "siang" => Ok(Self::Midday),
            "afternoon" | "sore" => Ok(Self::Afternoon),
            "evening" | "malam" => Ok(Self::Evening),
            other => Err(EngineError::InvalidIntent(format!(
                "unknown time period: {other}"
            ))),
        }
    }
}

/// A validated recommendation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub faculty: Option<String>,
    pub hunger_level: Option<HungerLevel>,
    pub budget: Option<u32>,
    pub time_period: TimePeriod,
}

impl Intent {
    pub fn new(
        faculty: Option<String>,
        hunger_level: Option<HungerLevel>,
        budget: Option<u32>,
        time_period: TimePeriod,
    ) -> Self {
        Self {
            faculty: faculty.filter(|f| !f.trim().is_empty()),
            hunger_level,
            budget,
            time_period,
        }
    }

    /// Build an intent from raw boundary values.
    ///
    /// Rejects negative budgets and hunger levels outside the enumeration.
    pub fn from_raw(
        faculty: Option<&str>,
        hunger_level: Option<&str>,
        budget: Option<i64>,
        time_period: Option<TimePeriod>,
    ) -> Result<Self, EngineError> {
        let hunger_level = hunger_level.map(str::parse).transpose()?;
        let budget = match budget {
            Some(b) if b < 0 => {
                return Err(EngineError::InvalidIntent(format!(
                    "budget must not be negative (got {b})"
                )))
            }
            Some(b) => Some(u32::try_from(b).map_err(|_| {
                EngineError::InvalidIntent(format!("budget out of range: {b}"))
            })?),
            None => None,
        };
        Ok(Self::new(
            faculty.map(str::to_string),
            hunger_level,
            budget,
            time_period.unwrap_or_else(TimePeriod::now),
        ))
    }

    /// `true` if the intent carries no faculty, hunger, or budget signal.
    pub fn is_empty(&self) -> bool {
        self.faculty.is_none() && self.hunger_level.is_none() && self.budget.is_none()
    }
}

/// Parse a budget written the way students type it.
///
/// `"15k"`, `"15rb"`, `"15 ribu"` → 15000. A bare number below
/// [`BUDGET_THOUSANDS_BOUNDARY`] is read as thousands; anything at or above it is literal.
pub fn parse_budget(text: &str) -> Option<u32> {
    let compact: String = text
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '.' && *c != ',')
        .collect();

    let start = compact.find(|c: char| c.is_ascii_digit())?;
    let digits: String = compact[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let value: u32 = digits.parse().ok()?;
    let suffix = &compact[start + digits.len()..];

    if ["k", "rb", "ribu"].iter().any(|s| suffix.starts_with(s)) {
        return value.checked_mul(1000);
    }
    if value < BUDGET_THOUSANDS_BOUNDARY {
        value.checked_mul(1000)
    } else {
        Some(value)
    }
}
