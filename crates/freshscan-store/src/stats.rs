//! Per-owner aggregates for the profile screen.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Utc};
use rusqlite::params;
use uuid::Uuid;

use freshscan_shared::api::{FreshnessCounts, ScanStatsView, ScoreBandCounts};
use freshscan_shared::constants::STATS_MONTHS;
use freshscan_shared::Freshness;

use crate::database::Database;
use crate::error::Result;
use crate::models::{conversion_err, ts_from_sql};

impl Database {
    /// Compute scan statistics for `owner_id` relative to `now`.
    ///
    /// With no scans the average is 0 and `last_scan_date` is `None`.
    pub fn scan_stats(&self, owner_id: Uuid, now: DateTime<Utc>) -> Result<ScanStatsView> {
        let owner = owner_id.to_string();

        let (total, average, last, excellent, good, fair, poor): (
            i64,
            Option<f64>,
            Option<String>,
            i64,
            i64,
            i64,
            i64,
        ) = self.conn().query_row(
            "SELECT COUNT(*),
                    AVG(quality_score),
                    MAX(analyzed_at),
                    COALESCE(SUM(CASE WHEN quality_score >= 90 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN quality_score BETWEEN 70 AND 89 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN quality_score BETWEEN 50 AND 69 THEN 1 ELSE 0 END), 0),
                    COALESCE(SUM(CASE WHEN quality_score < 50 THEN 1 ELSE 0 END), 0)
             FROM scans WHERE owner_id = ?1",
            params![owner],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            },
        )?;

        let last_scan_date = last
            .map(|s| ts_from_sql(&s).map_err(|e| conversion_err(2, e)))
            .transpose()?;

        let mut freshness = FreshnessCounts::default();
        {
            let mut stmt = self.conn().prepare(
                "SELECT freshness, COUNT(*) FROM scans WHERE owner_id = ?1 GROUP BY freshness",
            )?;
            let rows = stmt.query_map(params![owner], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (name, count) = row?;
                let count = to_count(count);
                match name.parse::<Freshness>() {
                    Ok(Freshness::Excellent) => freshness.excellent = count,
                    Ok(Freshness::Good) => freshness.good = count,
                    Ok(Freshness::Fair) => freshness.fair = count,
                    Ok(Freshness::Poor) => freshness.poor = count,
                    Err(e) => tracing::warn!(error = %e, "skipping unknown freshness in stats"),
                }
            }
        }

        let window = trailing_months(now, STATS_MONTHS);
        let mut monthly: BTreeMap<String, u64> =
            window.iter().map(|key| (key.clone(), 0)).collect();
        if let Some(oldest) = window.first() {
            let cutoff = format!("{oldest}-01T00:00:00");
            let mut stmt = self.conn().prepare(
                "SELECT substr(analyzed_at, 1, 7) AS ym, COUNT(*)
                 FROM scans
                 WHERE owner_id = ?1 AND analyzed_at >= ?2
                 GROUP BY ym",
            )?;
            let rows = stmt.query_map(params![owner, cutoff], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (ym, count) = row?;
                if let Some(slot) = monthly.get_mut(&ym) {
                    *slot = to_count(count);
                }
            }
        }

        Ok(ScanStatsView {
            total_scans: to_count(total),
            average_score: average.map_or(0, |avg| avg.round().clamp(0.0, 100.0) as u32),
            last_scan_date,
            freshness,
            score_bands: ScoreBandCounts {
                excellent: to_count(excellent),
                good: to_count(good),
                fair: to_count(fair),
                poor: to_count(poor),
            },
            monthly,
        })
    }
}

fn to_count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

/// `YYYY-MM` keys for the `months` months ending with the month of `now`,
/// oldest first.
pub fn trailing_months(now: DateTime<Utc>, months: u32) -> Vec<String> {
    let mut year = now.year();
    let mut month = now.month();
    let mut keys = Vec::with_capacity(months as usize);
    for _ in 0..months {
        keys.push(format!("{year:04}-{month:02}"));
        if month == 1 {
            month = 12;
            year -= 1;
        } else {
            month -= 1;
        }
    }
    keys.reverse();
    keys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scans::tests::{account, file, outcome};
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_trailing_months_wraps_year() {
        let now = Utc.with_ymd_and_hms(2024, 2, 15, 12, 0, 0).unwrap();
        assert_eq!(
            trailing_months(now, 6),
            vec!["2023-09", "2023-10", "2023-11", "2023-12", "2024-01", "2024-02"]
        );
    }

    #[test]
    fn test_stats_empty_account() {
        let db = Database::open_in_memory().unwrap();
        let owner = account(&db, "empty@example.com");

        let stats = db.scan_stats(owner, Utc::now()).unwrap();
        assert_eq!(stats.total_scans, 0);
        assert_eq!(stats.average_score, 0);
        assert!(stats.last_scan_date.is_none());
        assert_eq!(stats.freshness, FreshnessCounts::default());
        assert_eq!(stats.score_bands, ScoreBandCounts::default());
        assert_eq!(stats.monthly.len(), 6);
        assert!(stats.monthly.values().all(|&c| c == 0));
    }

    #[test]
    fn test_stats_aggregates() {
        let db = Database::open_in_memory().unwrap();
        let owner = account(&db, "a@example.com");
        let other = account(&db, "b@example.com");
        let now = Utc.with_ymd_and_hms(2024, 6, 20, 10, 0, 0).unwrap();

        let scans = [
            (95, Freshness::Excellent, now - Duration::days(1)),
            (72, Freshness::Good, now - Duration::days(40)),
            (55, Freshness::Fair, now - Duration::days(70)),
            (20, Freshness::Poor, now - Duration::days(400)),
        ];
        for (score, fresh, at) in scans {
            db.insert_scan(owner, file(), outcome(score, fresh), &format!("{}.jpg", Uuid::new_v4()), at)
                .unwrap();
        }
        db.insert_scan(other, file(), outcome(100, Freshness::Excellent), "other.jpg", now)
            .unwrap();

        let stats = db.scan_stats(owner, now).unwrap();
        assert_eq!(stats.total_scans, 4);
        // (95 + 72 + 55 + 20) / 4 = 60.5 -> 61
        assert_eq!(stats.average_score, 61);
        assert_eq!(stats.last_scan_date, Some(now - Duration::days(1)));
        assert_eq!(
            stats.freshness,
            FreshnessCounts {
                excellent: 1,
                good: 1,
                fair: 1,
                poor: 1
            }
        );
        assert_eq!(
            stats.score_bands,
            ScoreBandCounts {
                excellent: 1,
                good: 1,
                fair: 1,
                poor: 1
            }
        );

        // Window is 2024-01 ..= 2024-06; the 400-day-old scan falls outside.
        assert_eq!(stats.monthly.get("2024-06"), Some(&1));
        assert_eq!(stats.monthly.get("2024-05"), Some(&1));
        assert_eq!(stats.monthly.get("2024-04"), Some(&1));
        assert_eq!(stats.monthly.get("2024-01"), Some(&0));
        assert_eq!(stats.monthly.values().sum::<u64>(), 3);
    }
}
