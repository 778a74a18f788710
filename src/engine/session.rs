//! Exchange session clock
//!
//! The market-close exit rule fires at or after a configured wall-clock
//! time in the exchange's local timezone (12:59 PM Pacific for the regular
//! session in the reference deployment).

use crate::config::SessionConfig;
use crate::error::{BotError, Result};
use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;

#[derive(Debug, Clone)]
pub struct SessionClock {
    tz: Tz,
    close_hour: u32,
    close_minute: u32,
}

impl SessionClock {
    pub fn new(tz: Tz, close_hour: u32, close_minute: u32) -> Self {
        Self {
            tz,
            close_hour,
            close_minute,
        }
    }

    pub fn from_config(cfg: &SessionConfig) -> Result<Self> {
        let tz: Tz = cfg
            .timezone
            .parse()
            .map_err(|_| BotError::Config(format!("unknown timezone: {}", cfg.timezone)))?;
        Ok(Self::new(tz, cfg.close_hour, cfg.close_minute))
    }

    /// Is the exchange-local time at or after the session close?
    pub fn past_close(&self) -> bool {
        self.past_close_at(Utc::now())
    }

    pub fn past_close_at(&self, now: DateTime<Utc>) -> bool {
        let local = now.with_timezone(&self.tz);
        let minutes = local.hour() * 60 + local.minute();
        minutes >= self.close_hour * 60 + self.close_minute
    }
}
