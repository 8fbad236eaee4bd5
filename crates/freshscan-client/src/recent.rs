//! Recently viewed scans, kept on the device.
//!
//! Both implementations keep at most `limit` entries, newest first. Appending a
//! scan that is already cached moves it to the front.

use std::collections::VecDeque;

use chrono::Utc;
use tracing::debug;

use freshscan_shared::api::ScanView;
use freshscan_shared::constants::RECENT_SCANS_LIMIT;
use freshscan_store::Database;

use crate::error::Error;

pub trait RecentScans {
    /// Save `scan` as the newest entry, evicting the oldest beyond the limit.
    fn append(&mut self, scan: &ScanView) -> Result<(), Error>;

    /// Cached scans, newest first.
    fn list(&self) -> Result<Vec<ScanView>, Error>;

    fn clear(&mut self) -> Result<(), Error>;
}

/// In-memory cache, lost when the process exits.
#[derive(Debug, Clone)]
pub struct MemoryRecentScans {
    scans: VecDeque<ScanView>,
    limit: usize,
}

impl MemoryRecentScans {
    pub fn new(limit: usize) -> Self {
        Self {
            scans: VecDeque::with_capacity(limit),
            limit,
        }
    }
}

impl Default for MemoryRecentScans {
    fn default() -> Self {
        Self::new(RECENT_SCANS_LIMIT)
    }
}

impl RecentScans for MemoryRecentScans {
    fn append(&mut self, scan: &ScanView) -> Result<(), Error> {
        self.scans.retain(|s| s.id != scan.id);
        self.scans.push_front(scan.clone());
        self.scans.truncate(self.limit);
        Ok(())
    }

    fn list(&self) -> Result<Vec<ScanView>, Error> {
        Ok(self.scans.iter().cloned().collect())
    }

    fn clear(&mut self) -> Result<(), Error> {
        self.scans.clear();
        Ok(())
    }
}

/// Cache persisted in a local SQLite database.
pub struct StoreRecentScans {
    db: Database,
    limit: usize,
}

impl StoreRecentScans {
    pub fn new(db: Database, limit: usize) -> Self {
        Self { db, limit }
    }

    /// Open the cache file at `path` with the default limit.
    pub fn open(path: &std::path::Path) -> Result<Self, Error> {
        Ok(Self::new(Database::open_at(path)?, RECENT_SCANS_LIMIT))
    }
}

impl RecentScans for StoreRecentScans {
    fn append(&mut self, scan: &ScanView) -> Result<(), Error> {
        self.db.push_recent_scan(scan, self.limit, Utc::now())?;
        Ok(())
    }

    fn list(&self) -> Result<Vec<ScanView>, Error> {
        Ok(self.db.list_recent_scans()?)
    }

    fn clear(&mut self) -> Result<(), Error> {
        let removed = self.db.clear_recent_scans()?;
        debug!(removed, "Cleared recent scans");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freshscan_shared::api::AnalysisMetadataView;
    use freshscan_shared::{ContentType, Freshness, NutritionClass};
    use uuid::Uuid;

    fn scan(score: u8) -> ScanView {
        let id = Uuid::new_v4();
        ScanView {
            id,
            file_name: format!("item-{score}.jpg"),
            content_type: ContentType::Jpeg,
            file_size: 1024,
            image_path: format!("/scan/{id}/image"),
            analyzed_at: Utc::now(),
            quality_score: score,
            freshness: Freshness::Good,
            nutrition: NutritionClass::Medium,
            recommendations: vec!["Store in a cool, dry place".into()],
            warnings: Vec::new(),
            metadata: AnalysisMetadataView {
                processing_time_ms: 12,
                model_version: "synthetic-v1".into(),
                confidence: 0.9,
            },
        }
    }

    fn exercise(cache: &mut dyn RecentScans) {
        let scans: Vec<ScanView> = (0..5).map(|i| scan(70 + i)).collect();
        for s in &scans {
            cache.append(s).unwrap();
        }

        let listed = cache.list().unwrap();
        let scores: Vec<u8> = listed.iter().map(|s| s.quality_score).collect();
        assert_eq!(scores, vec![74, 73, 72]);
        assert_eq!(listed[0], scans[4]);

        // Appending a cached entry again moves it to the front without duplicating it.
        cache.append(&scans[2]).unwrap();
        let scores: Vec<u8> = cache.list().unwrap().iter().map(|s| s.quality_score).collect();
        assert_eq!(scores, vec![72, 74, 73]);

        cache.clear().unwrap();
        assert!(cache.list().unwrap().is_empty());
    }

    #[test]
    fn test_memory_cache_keeps_newest() {
        exercise(&mut MemoryRecentScans::new(3));
    }

    #[test]
    fn test_store_cache_keeps_newest() {
        let db = Database::open_in_memory().unwrap();
        exercise(&mut StoreRecentScans::new(db, 3));
    }

    #[test]
    fn test_store_cache_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recent.db");
        let first = scan(88);
        {
            let mut cache = StoreRecentScans::open(&path).unwrap();
            cache.append(&first).unwrap();
        }
        let cache = StoreRecentScans::open(&path).unwrap();
        assert_eq!(cache.list().unwrap(), vec![first]);
    }
}
