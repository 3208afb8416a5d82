use std::{ops::Deref, time::Duration};

use crate::EvenpaceError;

/// Maximum permitted invocations per 60-second window.
///
/// A value is valid iff it is finite and greater than zero. Fractional rates
/// are legitimate: `0.5` means one call every two minutes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CallsPerMinute(f64);

impl CallsPerMinute {
    /// Largest representable rate. The derived spacing floor rounds to zero,
    /// so a throttle built from it admits every caller immediately.
    pub fn max() -> Self {
        Self(f64::MAX)
    }

    /// Minimum spacing enforced between two consecutive release events,
    /// `60 / rate` seconds.
    pub fn min_interval(&self) -> Duration {
        Duration::try_from_secs_f64(60.0 / self.0).unwrap_or(Duration::MAX)
    }
}

impl Deref for CallsPerMinute {
    type Target = f64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<f64> for CallsPerMinute {
    type Error = EvenpaceError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() || value <= 0.0 {
            return Err(EvenpaceError::InvalidConfiguration(
                "calls per minute must be a finite value greater than 0",
            ));
        }

        Ok(Self(value))
    }
}

impl TryFrom<u32> for CallsPerMinute {
    type Error = EvenpaceError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::try_from(value as f64)
    }
}
