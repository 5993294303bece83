// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

//! The line protocol spoken by the sensor server.
//!
//! Every exchange is a single request line answered by a single reply line:
//!
//! | Request            | Reply                          |
//! |--------------------|--------------------------------|
//! | `GET_TEMP`         | `TEMP=<float>,HUM=<float>`     |
//! | `LED=<0..=15>`     | free-form acknowledgement      |

use std::fmt;

use crate::error::{ProtocolError, ValidationError};

/// Request for the current temperature and humidity.
pub const GET_TEMP: &str = "GET_TEMP";

const TEMP_PREFIX: &str = "TEMP=";
const HUM_PREFIX: &str = "HUM=";

/// A validated 4-bit LED intensity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LedLevel(u8);

impl LedLevel {
    pub const MAX: u8 = 15;

    pub fn new(value: i64) -> Result<Self, ValidationError> {
        match u8::try_from(value) {
            Ok(level) if level <= Self::MAX => Ok(Self(level)),
            _ => Err(ValidationError::LedOutOfRange(value)),
        }
    }

    /// Parses the text of the LED entry field.
    pub fn parse(text: &str) -> Result<Self, ValidationError> {
        let text = text.trim();
        let value = text
            .parse::<i64>()
            .map_err(|_| ValidationError::LedNotANumber(text.to_string()))?;
        Self::new(value)
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// The request line (without terminator) setting this level.
    pub fn command(self) -> String {
        format!("LED={}", self.0)
    }
}

impl fmt::Display for LedLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parses a `TEMP=<float>,HUM=<float>` reply into `(temperature, humidity)`.
pub fn parse_reading(response: &str) -> Result<(f32, f32), ProtocolError> {
    let unexpected = || ProtocolError::UnexpectedResponse {
        raw: response.to_string(),
    };

    let rest = response.trim().strip_prefix(TEMP_PREFIX).ok_or_else(unexpected)?;
    let (temperature, humidity) = rest.split_once(',').ok_or_else(unexpected)?;
    let humidity = humidity.trim_start().strip_prefix(HUM_PREFIX).ok_or_else(unexpected)?;

    let temperature = temperature.trim().parse::<f32>().map_err(|_| unexpected())?;
    let humidity = humidity.trim().parse::<f32>().map_err(|_| unexpected())?;

    Ok((temperature, humidity))
}
