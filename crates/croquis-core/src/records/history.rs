use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Describes the reference image a drawing was made from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ImageMetadata {
    pub filename: String,
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub size: u64,
}

/// One completed drawing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PracticeSession {
    pub recorded_at: DateTime<Utc>,
    /// Calendar day in the user's local time; the heatmap buckets on this.
    pub date: NaiveDate,
    pub duration_secs: u32,
    #[serde(default)]
    pub deck_id: Option<Uuid>,
    #[serde(default)]
    pub image: Option<ImageMetadata>,
    /// File name of the drawing pair saved for this session.
    #[serde(default)]
    pub pair: Option<String>,
}

/// Consecutive-day practice runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Streaks {
    /// Run ending today, or yesterday when today has no session yet.
    pub current: u32,
    pub longest: u32,
}

/// Append-only practice log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct HistoryLog {
    #[serde(default)]
    sessions: Vec<PracticeSession>,
}

impl HistoryLog {
    pub fn append(&mut self, session: PracticeSession) {
        self.sessions.push(session);
    }

    pub fn sessions(&self) -> &[PracticeSession] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Number of sessions per calendar day.
    pub fn daily_counts(&self) -> BTreeMap<NaiveDate, u32> {
        let mut counts = BTreeMap::new();
        for session in &self.sessions {
            *counts.entry(session.date).or_insert(0) += 1;
        }
        counts
    }

    pub fn count_on(&self, date: NaiveDate) -> u32 {
        self.sessions.iter().filter(|s| s.date == date).count() as u32
    }

    pub fn total_duration_secs(&self) -> u64 {
        self.sessions
            .iter()
            .map(|s| u64::from(s.duration_secs))
            .sum()
    }

    pub fn streaks(&self, today: NaiveDate) -> Streaks {
        let counts = self.daily_counts();
        let mut longest = 0;
        let mut run = 0;
        let mut prev: Option<NaiveDate> = None;
        for &day in counts.keys() {
            run = match prev {
                Some(p) if p.checked_add_days(Days::new(1)) == Some(day) => run + 1,
                _ => 1,
            };
            longest = longest.max(run);
            prev = Some(day);
        }

        let mut current = 0;
        let mut cursor = if counts.contains_key(&today) {
            Some(today)
        } else {
            today.pred_opt()
        };
        while let Some(day) = cursor.filter(|d| counts.contains_key(d)) {
            current += 1;
            cursor = day.pred_opt();
        }

        Streaks { current, longest }
    }
}
