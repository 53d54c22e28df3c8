use std::fs;

use anyhow::{Context, Result};
use chrono::{Days, Local, NaiveDate};
use croquis_core::{records::HistoryLog, store::RecordStore};
use croquis_library::{
    probe_image, DeckLibrary, DrawingCapture, PracticeJournal, RecentDeckList, SessionCapture,
};

use crate::{cli::HistoryCommand, decks};

/// Execute a history subcommand against `store`.
pub fn handle<S: RecordStore>(cmd: HistoryCommand, store: &S) -> Result<()> {
    let journal = PracticeJournal::new(store);

    match cmd {
        HistoryCommand::Log {
            duration,
            deck,
            image,
            drawing,
        } => {
            let deck_id = match deck {
                Some(reference) => {
                    let deck = decks::resolve(&DeckLibrary::new(store), &reference)?;
                    RecentDeckList::new(store).touch(deck.id)?;
                    Some(deck.id)
                }
                None => None,
            };
            let metadata = image.as_deref().map(probe_image).transpose()?;
            let drawing = match (&image, drawing) {
                (Some(original), Some(screenshot)) => Some(DrawingCapture {
                    original: fs::read(original)
                        .with_context(|| format!("reading {}", original.display()))?,
                    screenshot: fs::read(&screenshot)
                        .with_context(|| format!("reading {}", screenshot.display()))?,
                }),
                _ => None,
            };

            let session = journal.record_session(
                SessionCapture {
                    duration_secs: duration,
                    deck_id,
                    image: metadata,
                    drawing,
                },
                Local::now(),
            )?;
            println!("Recorded {}s on {}", session.duration_secs, session.date);
            if let Some(pair) = session.pair {
                println!("Saved drawing pair {pair}");
            }
        }
        HistoryCommand::Stats { days } => {
            let loaded = journal.history();
            if let Some(error) = loaded.recovery_error() {
                eprintln!("! practice history could not be read ({error}); showing an empty log");
            }
            for line in stats_lines(loaded.record(), Local::now().date_naive(), days) {
                println!("{line}");
            }
        }
        HistoryCommand::Pairs => {
            let listing = journal.pairs()?;
            if listing.pairs.is_empty() && listing.failures.is_empty() {
                println!("No saved drawings yet.");
            }
            for (name, pair) in &listing.pairs {
                let memo = if pair.memo.is_empty() {
                    String::new()
                } else {
                    format!("  \"{}\"", pair.memo)
                };
                println!("{name}  {}s{memo}", pair.duration_secs);
            }
            for failure in listing.failures {
                eprintln!("! {} could not be read: {}", failure.file, failure.error);
            }
        }
        HistoryCommand::Memo { name, text } => {
            let pair = journal.set_memo(&name, &text.join(" "))?;
            println!("{name}: {}", pair.memo);
        }
    }

    Ok(())
}

fn stats_lines(log: &HistoryLog, today: NaiveDate, days: u32) -> Vec<String> {
    let streaks = log.streaks(today);
    let mut lines = vec![
        format!("today: {}", log.count_on(today)),
        format!(
            "total: {} drawings, {} min",
            log.len(),
            log.total_duration_secs() / 60
        ),
        format!(
            "streak: {} days (longest {})",
            streaks.current, streaks.longest
        ),
    ];

    let counts = log.daily_counts();
    for back in (0..days).rev() {
        let Some(day) = today.checked_sub_days(Days::new(u64::from(back))) else {
            continue;
        };
        let count = counts.get(&day).copied().unwrap_or(0);
        lines.push(format!(
            "{day}  {count:>3}  {}",
            "#".repeat(count.min(40) as usize)
        ));
    }
    lines
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use croquis_core::records::PracticeSession;

    use super::*;
    use crate::storage;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("date")
    }

    #[test]
    fn stats_summarise_recent_days() {
        let mut log = HistoryLog::default();
        for (date, secs) in [("2024-03-01", 60), ("2024-03-02", 120), ("2024-03-03", 120)] {
            log.append(PracticeSession {
                recorded_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
                date: day(date),
                duration_secs: secs,
                deck_id: None,
                image: None,
                pair: None,
            });
        }

        let lines = stats_lines(&log, day("2024-03-03"), 3);
        assert_eq!(lines[0], "today: 1");
        assert_eq!(lines[1], "total: 3 drawings, 5 min");
        assert_eq!(lines[2], "streak: 3 days (longest 3)");
        assert_eq!(lines[3], "2024-03-01    1  #");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn log_with_drawing_saves_pair() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = storage::test_store(dir.path().join("data"));
        let reference = dir.path().join("figure.png");
        image::RgbImage::new(2, 3).save(&reference).expect("png");
        let screenshot = dir.path().join("shot.png");
        image::RgbImage::new(5, 5).save(&screenshot).expect("png");

        handle(
            HistoryCommand::Log {
                duration: 90,
                deck: None,
                image: Some(reference),
                drawing: Some(screenshot),
            },
            &store,
        )
        .expect("log");

        let journal = PracticeJournal::new(&store);
        let log = journal.history().into_record();
        assert_eq!(log.len(), 1);
        let session = &log.sessions()[0];
        let image = session.image.as_ref().expect("image metadata");
        assert_eq!((image.width, image.height), (2, 3));

        let name = session.pair.clone().expect("pair");
        handle(
            HistoryCommand::Memo {
                name: name.clone(),
                text: vec!["good".into(), "gesture".into()],
            },
            &store,
        )
        .expect("memo");
        assert_eq!(journal.load_pair(&name).expect("pair").memo, "good gesture");
        handle(HistoryCommand::Pairs, &store).expect("pairs");
    }

    #[test]
    fn log_against_deck_marks_it_recent() {
        let store = croquis_core::store::InMemoryRecordStore::new();
        let deck = DeckLibrary::new(&store).create("Hands").expect("create");

        handle(
            HistoryCommand::Log {
                duration: 30,
                deck: Some("hands".into()),
                image: None,
                drawing: None,
            },
            &store,
        )
        .expect("log");

        let log = PracticeJournal::new(&store).history().into_record();
        assert_eq!(log.sessions()[0].deck_id, Some(deck.id));
        assert_eq!(RecentDeckList::new(&store).list(), vec![deck.id]);
        handle(HistoryCommand::Stats { days: 7 }, &store).expect("stats");
    }
}
