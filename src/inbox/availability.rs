// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Provider availability as a UTC hour range.

use chrono::{DateTime, Timelike, Utc};

/// Hours `[start, end)` in UTC. `start > end` wraps past midnight;
/// `start == end` is never open, `0..24` is always open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkingHours {
    pub start: u8,
    pub end: u8,
}

impl Default for WorkingHours {
    fn default() -> Self {
        Self { start: 0, end: 24 }
    }
}

impl WorkingHours {
    pub fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    pub fn is_open_at(&self, at: DateTime<Utc>) -> bool {
        let hour = at.hour() as u8;
        if self.start <= self.end {
            hour >= self.start && hour < self.end
        } else {
            hour >= self.start || hour < self.end
        }
    }

    pub fn is_open_now(&self) -> bool {
        self.is_open_at(Utc::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, hour, 30, 0).unwrap()
    }

    #[test]
    fn default_is_always_open() {
        let hours = WorkingHours::default();
        assert!((0..24).all(|h| hours.is_open_at(at(h))));
    }

    #[test]
    fn business_hours_exclude_end() {
        let hours = WorkingHours::new(9, 17);
        assert!(!hours.is_open_at(at(8)));
        assert!(hours.is_open_at(at(9)));
        assert!(hours.is_open_at(at(16)));
        assert!(!hours.is_open_at(at(17)));
    }

    #[test]
    fn overnight_range_wraps() {
        let hours = WorkingHours::new(22, 6);
        assert!(hours.is_open_at(at(23)));
        assert!(hours.is_open_at(at(2)));
        assert!(!hours.is_open_at(at(12)));
    }

    #[test]
    fn empty_range_is_closed() {
        let hours = WorkingHours::new(5, 5);
        assert!(!(0..24).any(|h| hours.is_open_at(at(h))));
    }
}
