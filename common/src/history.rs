// Copyright © SixtyFPS GmbH <info@slint.dev>
// SPDX-License-Identifier: MIT

use std::collections::VecDeque;

use crate::reading::Reading;

/// Fixed-capacity FIFO of the most recent readings, oldest first.
///
/// The temperature, humidity and label series handed to the chart are
/// projections of the same sequence, so they always have the same length.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HistoryWindow {
    readings: VecDeque<Reading>,
}

impl HistoryWindow {
    /// Number of readings kept before the oldest one is evicted.
    pub const CAPACITY: usize = 20;

    pub fn new() -> Self {
        Self {
            readings: VecDeque::with_capacity(Self::CAPACITY),
        }
    }

    /// Appends `reading`, evicting the oldest entry once the window is full.
    pub fn push(&mut self, reading: Reading) {
        if self.readings.len() == Self::CAPACITY {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn clear(&mut self) {
        self.readings.clear();
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Reading> + '_ {
        self.readings.iter()
    }

    pub fn temperatures(&self) -> Vec<f32> {
        self.iter().map(Reading::temperature_celsius).collect()
    }

    pub fn humidities(&self) -> Vec<f32> {
        self.iter().map(Reading::humidity_percent).collect()
    }

    pub fn time_labels(&self) -> Vec<String> {
        self.iter().map(Reading::time_label).collect()
    }
}

impl<'a> IntoIterator for &'a HistoryWindow {
    type Item = &'a Reading;
    type IntoIter = std::collections::vec_deque::Iter<'a, Reading>;

    fn into_iter(self) -> Self::IntoIter {
        self.readings.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_the_last_twenty_in_order() {
        let mut window = HistoryWindow::new();
        for i in 0..45 {
            window.push(Reading::now(i as f32, 100.0 - i as f32));
            assert!(window.len() <= HistoryWindow::CAPACITY);
        }

        assert_eq!(window.len(), 20);
        let expected: Vec<f32> = (25..45).map(|i| i as f32).collect();
        assert_eq!(window.temperatures(), expected);
        assert_eq!(window.humidities()[0], 75.0);
        assert_eq!(window.latest().map(Reading::temperature_celsius), Some(44.0));
    }

    #[test]
    fn series_stay_in_lockstep() {
        let mut window = HistoryWindow::new();
        for i in 0..7 {
            window.push(Reading::now(i as f32, i as f32));
        }

        assert_eq!(window.temperatures().len(), 7);
        assert_eq!(window.humidities().len(), 7);
        assert_eq!(window.time_labels().len(), 7);

        window.clear();
        assert!(window.is_empty());
        assert!(window.latest().is_none());
    }
}
