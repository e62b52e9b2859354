use anyhow::{Context, Result};
use jiff::{
    civil::Date,
    tz::{Offset, TimeZone},
    Zoned,
};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

// Tunables for one engine instance. Every field has a default, so an empty RON
// struct `()` is a valid settings file.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Minimum days between any two vaccinations.
    pub min_spacing_days: u32,
    /// Minimum days after a live vaccine before another live vaccine.
    pub live_spacing_days: u32,
    /// Offset from UTC used to decide what "today" is.
    pub utc_offset_hours: i8,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            min_spacing_days: 14,
            live_spacing_days: 28,
            utc_offset_hours: 7,
        }
    }
}

impl EngineSettings {
    pub fn from_ron_str(text: &str) -> Result<Self> {
        let settings: Self = ron::from_str(text)?;
        settings.offset()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading engine settings {}", path.display()))?;
        Self::from_ron_str(&text).with_context(|| format!("parsing engine settings {}", path.display()))
    }

    fn offset(&self) -> Result<Offset> {
        Offset::from_hours(self.utc_offset_hours)
            .with_context(|| format!("utc_offset_hours {} is out of range", self.utc_offset_hours))
    }

    /// Today's date at the configured fixed offset.
    pub fn reference_today(&self) -> Result<Date> {
        Ok(Zoned::now()
            .with_time_zone(TimeZone::fixed(self.offset()?))
            .date())
    }
}
