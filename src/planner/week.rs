use chrono::Weekday;
use serde::{Deserialize, Serialize};

pub const WEEK_DAYS: [&str; 7] = [
    "Понедельник",
    "Вторник",
    "Среда",
    "Четверг",
    "Пятница",
    "Суббота",
    "Воскресенье",
];

const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// A contiguous run of weekdays, `start..end` as indices from Monday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayBlock {
    pub start: usize,
    pub end: usize,
}

impl DayBlock {
    pub fn days(&self) -> &'static [&'static str] {
        &WEEK_DAYS[self.start..self.end]
    }

    /// `"<FirstDay>-<LastDay>"`, also for single-day blocks.
    pub fn label(&self) -> String {
        format!("{}-{}", WEEK_DAYS[self.start], WEEK_DAYS[self.end - 1])
    }

    pub fn start_weekday(&self) -> Weekday {
        WEEKDAYS[self.start]
    }
}

/// Splits Monday..Sunday into `block_count` contiguous blocks of
/// `7 / block_count` days each; the last block runs to Sunday and absorbs
/// the remainder. `block_count` is clamped to `1..=7`.
pub fn partition_week(block_count: usize) -> Vec<DayBlock> {
    let count = block_count.clamp(1, WEEK_DAYS.len());
    let size = WEEK_DAYS.len() / count;
    (0..count)
        .map(|i| {
            let start = i * size;
            let end = if i + 1 == count { WEEK_DAYS.len() } else { start + size };
            DayBlock { start, end }
        })
        .collect()
}
