use chrono::{DateTime, Local};

/// One temperature and humidity sample, stamped with the local time it was
/// received at.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reading {
    temperature_celsius: f32,
    humidity_percent: f32,
    when: DateTime<Local>,
}

impl Reading {
    pub fn new(temperature_celsius: f32, humidity_percent: f32, when: DateTime<Local>) -> Self {
        Self {
            temperature_celsius,
            humidity_percent,
            when,
        }
    }

    /// A reading taken right now.
    pub fn now(temperature_celsius: f32, humidity_percent: f32) -> Self {
        Self::new(temperature_celsius, humidity_percent, Local::now())
    }

    pub fn temperature_celsius(&self) -> f32 {
        self.temperature_celsius
    }

    pub fn humidity_percent(&self) -> f32 {
        self.humidity_percent
    }

    pub fn when(&self) -> DateTime<Local> {
        self.when
    }

    /// Chart axis label, `HH:MM:SS`.
    pub fn time_label(&self) -> String {
        self.when.format("%H:%M:%S").to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn time_label_uses_wall_clock_seconds() {
        let when = Local.with_ymd_and_hms(2024, 5, 1, 9, 4, 7).unwrap();
        let reading = Reading::new(23.5, 55.1, when);

        assert_eq!(reading.time_label(), "09:04:07");
        assert_eq!(reading.temperature_celsius(), 23.5);
        assert_eq!(reading.humidity_percent(), 55.1);
    }
}
