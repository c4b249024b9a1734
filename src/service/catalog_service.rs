//! Catalog synchronizer: keeps the blob store and the track catalog in step
//! for uploads, listings and deletes.
//!
//! Consistency between the two stores is best effort. Nothing here locks
//! across requests, so two concurrent uploads of one filename can both pass
//! the existence check and produce two records.

use crate::catalog::{CatalogStore, Track};
use crate::error::CatalogError;
use crate::storage::{sanitize_filename, BlobStore};
use bytes::Bytes;
use chrono::Utc;
use log::{debug, info, warn, error};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// One file taken from an upload request
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Filename as sent by the client
    pub filename: String,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self { filename: filename.into(), data: data.into() }
    }
}

/// Per-batch tally of what ingest did with each file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Files in the batch
    pub received: usize,
    /// Files whose bytes reached the blob store
    pub stored: usize,
    /// Records inserted into the catalog
    pub cataloged: usize,
    /// Files skipped because a record with the filename already existed
    pub duplicates: usize,
    /// Files skipped because the existence check failed
    pub check_failed: usize,
    /// Files skipped because the blob write failed
    pub write_failed: usize,
    /// Blobs removed again after a failed bulk insert
    pub compensated: usize,
}

/// Result of a delete-by-filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub records_removed: u64,
    pub blob_removed: bool,
}

/// A record waiting for the bulk insert, with the blob written for it
struct StagedTrack {
    track: Track,
    blob_name: String,
    /// The blob name was already taken before this upload wrote it
    blob_existed: bool,
}

fn unix_now() -> i64 {
    Utc::now().timestamp()
}

/// Orchestrates ingest, listing, shuffle and delete over the two stores
pub struct CatalogSynchronizer {
    blobs: Arc<dyn BlobStore>,
    catalog: Arc<dyn CatalogStore>,
    clock: fn() -> i64,
    compensate_failed_inserts: bool,
}

impl CatalogSynchronizer {
    /// Create a synchronizer over injected stores
    pub fn new(blobs: Arc<dyn BlobStore>, catalog: Arc<dyn CatalogStore>) -> Self {
        Self {
            blobs,
            catalog,
            clock: unix_now,
            compensate_failed_inserts: false,
        }
    }

    /// Replace the source of upload timestamps
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Remove freshly written blobs when the bulk insert fails
    pub fn with_compensation(mut self, enabled: bool) -> Self {
        self.compensate_failed_inserts = enabled;
        self
    }

    pub fn blob_store(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Store each file and catalog the ones not seen before.
    ///
    /// A failing item is logged and left out of the catalog; the batch goes on.
    /// Only the final bulk insert can fail the whole call, and blobs written
    /// before it stay on disk unless compensation is enabled.
    pub fn ingest(&self, files: Vec<UploadedFile>) -> Result<IngestReport, CatalogError> {
        let mut report = IngestReport { received: files.len(), ..IngestReport::default() };
        let mut staged: Vec<StagedTrack> = Vec::new();

        for file in files {
            log_mdc::insert("filename", &file.filename);

            let blob_name = match sanitize_filename(&file.filename) {
                Some(name) => name,
                None => {
                    warn!("Skipping upload with unusable filename {:?}", file.filename);
                    report.write_failed += 1;
                    continue;
                }
            };

            let blob_existed = self.blobs.blob_exists(&blob_name);
            if let Err(e) = self.blobs.put_blob(&blob_name, &file.data) {
                warn!("Failed to store blob {}: {}", blob_name, e);
                report.write_failed += 1;
                continue;
            }
            report.stored += 1;
            debug!("Stored {} bytes as blob {}", file.data.len(), blob_name);

            match self.catalog.count_by_filename(&file.filename) {
                Ok(0) => {}
                Ok(count) => {
                    warn!("{} already catalogued ({} records); blob overwritten, record keeps its original timestamp",
                          file.filename, count);
                    report.duplicates += 1;
                    continue;
                }
                Err(e) => {
                    warn!("Existence check failed for {}: {}", file.filename, e);
                    report.check_failed += 1;
                    continue;
                }
            }

            // a repeat of a name earlier in this same batch counts as a duplicate too
            if staged.iter().any(|item| item.track.filename == file.filename) {
                warn!("{} appears twice in one batch; keeping the first record", file.filename);
                report.duplicates += 1;
                continue;
            }

            staged.push(StagedTrack {
                track: Track::new(file.filename, (self.clock)()),
                blob_name,
                blob_existed,
            });
        }
        log_mdc::remove("filename");

        if !staged.is_empty() {
            let tracks: Vec<Track> = staged.iter().map(|item| item.track.clone()).collect();
            if let Err(e) = self.catalog.insert_many(&tracks) {
                error!("Bulk insert of {} records failed: {}", tracks.len(), e);
                if self.compensate_failed_inserts {
                    report.compensated = self.remove_new_blobs(&staged);
                    info!("Removed {} blobs after failed insert", report.compensated);
                }
                return Err(e);
            }
            report.cataloged = tracks.len();
        }

        info!("Ingest finished: {:?}", report);
        Ok(report)
    }

    /// Undo blob writes of staged items whose insert failed. A blob that was
    /// there before the batch, or that an existing record names, is kept.
    fn remove_new_blobs(&self, staged: &[StagedTrack]) -> usize {
        let mut removed = 0;
        for item in staged {
            let name = item.blob_name.as_str();
            if item.blob_existed {
                debug!("Keeping blob {}: it predates this upload", name);
                continue;
            }
            match self.catalog.count_by_filename(name) {
                Ok(0) => {}
                Ok(_) => {
                    debug!("Keeping blob {}: still catalogued", name);
                    continue;
                }
                Err(e) => {
                    warn!("Keeping blob {}: catalog check failed: {}", name, e);
                    continue;
                }
            }
            match self.blobs.remove_blob(name) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove blob {} during compensation: {}", name, e),
            }
        }
        removed
    }

    /// Every catalogued track, in store order
    pub fn listing(&self) -> Result<Vec<Track>, CatalogError> {
        let tracks = self.catalog.find_all()?;
        debug!("Listed {} tracks", tracks.len());
        Ok(tracks)
    }

    /// Every catalogued track in a uniformly random order, reseeded from the wall clock
    pub fn shuffled_listing(&self) -> Result<Vec<Track>, CatalogError> {
        let seed = Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64;
        let mut rng = StdRng::seed_from_u64(seed);
        self.shuffled_listing_with(&mut rng)
    }

    /// Every catalogued track shuffled with the given random source
    pub fn shuffled_listing_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<Track>, CatalogError> {
        let mut tracks = self.listing()?;
        tracks.shuffle(rng);
        Ok(tracks)
    }

    /// Delete the record for a filename, then try to remove its blob.
    ///
    /// Zero matching records is not an error. Blob removal failures are
    /// logged and never reported; only a catalog failure fails the call.
    pub fn delete(&self, filename: &str) -> Result<DeleteOutcome, CatalogError> {
        log_mdc::insert("filename", filename);
        let outcome = self.delete_record_and_blob(filename);
        log_mdc::remove("filename");
        outcome
    }

    fn delete_record_and_blob(&self, filename: &str) -> Result<DeleteOutcome, CatalogError> {
        let records_removed = self.catalog.delete_one(filename)?;
        if records_removed == 0 {
            debug!("No catalog record for {}", filename);
        }

        let blob_removed = match sanitize_filename(filename) {
            Some(name) => match self.blobs.remove_blob(&name) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Failed to delete file from disk: {}", e);
                    false
                }
            },
            None => {
                warn!("No blob can match filename {:?}", filename);
                false
            }
        };

        info!("Deleted {}: {} records, blob removed: {}", filename, records_removed, blob_removed);
        Ok(DeleteOutcome { records_removed, blob_removed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::mock_store::{CatalogOp, MockCatalogStore};
    use crate::storage::mock_store::MockBlobStore;

    const FIXED_NOW: i64 = 1_717_000_000;

    fn fixed_clock() -> i64 {
        FIXED_NOW
    }

    fn setup() -> (Arc<MockBlobStore>, Arc<MockCatalogStore>, CatalogSynchronizer) {
        let blobs = Arc::new(MockBlobStore::new());
        let catalog = Arc::new(MockCatalogStore::new());
        let sync = CatalogSynchronizer::new(blobs.clone(), catalog.clone()).with_clock(fixed_clock);
        (blobs, catalog, sync)
    }

    fn upload(names: &[&str]) -> Vec<UploadedFile> {
        names
            .iter()
            .map(|name| UploadedFile::new(*name, format!("bytes of {}", name).into_bytes()))
            .collect()
    }

    #[test]
    fn test_ingest_new_file_creates_one_record() {
        let (blobs, _, sync) = setup();

        let report = sync.ingest(upload(&["track1.mp3"])).unwrap();
        assert_eq!(report.cataloged, 1);

        let tracks = sync.listing().unwrap();
        assert_eq!(tracks, vec![Track { filename: "track1.mp3".into(), path: "/songs/track1.mp3".into(), uploaded: FIXED_NOW }]);
        assert_eq!(blobs.read_blob("track1.mp3").unwrap(), b"bytes of track1.mp3");
    }

    #[test]
    fn test_ingest_uses_wall_clock_by_default() {
        let blobs = Arc::new(MockBlobStore::new());
        let catalog = Arc::new(MockCatalogStore::new());
        let sync = CatalogSynchronizer::new(blobs, catalog);

        let before = Utc::now().timestamp();
        sync.ingest(upload(&["now.mp3"])).unwrap();
        let after = Utc::now().timestamp();

        let uploaded = sync.listing().unwrap()[0].uploaded;
        assert!(before <= uploaded && uploaded <= after);
    }

    #[test]
    fn test_sequential_reupload_keeps_single_record() {
        let (blobs, catalog, sync) = setup();

        sync.ingest(vec![UploadedFile::new("song.mp3", &b"first"[..])]).unwrap();
        let report = sync.ingest(vec![UploadedFile::new("song.mp3", &b"second"[..])]).unwrap();

        assert_eq!(report.duplicates, 1);
        assert_eq!(report.cataloged, 0);
        assert_eq!(catalog.count_by_filename("song.mp3").unwrap(), 1);
        // the blob is overwritten even though no record is created
        assert_eq!(blobs.read_blob("song.mp3").unwrap(), b"second");
    }

    #[test]
    fn test_duplicate_names_within_one_batch() {
        let (_, catalog, sync) = setup();
        let report = sync.ingest(upload(&["same.mp3", "same.mp3"])).unwrap();
        assert_eq!(report.stored, 2);
        assert_eq!(report.duplicates, 1);
        assert_eq!(catalog.count_by_filename("same.mp3").unwrap(), 1);
    }

    #[test]
    fn test_failed_blob_write_skips_only_that_item() {
        let (blobs, _, sync) = setup();
        blobs.reject_writes_for("b.mp3");

        let report = sync.ingest(upload(&["a.mp3", "b.mp3", "c.mp3"])).unwrap();
        assert_eq!(report.received, 3);
        assert_eq!(report.write_failed, 1);
        assert_eq!(report.cataloged, 2);

        let mut names: Vec<_> = sync.listing().unwrap().into_iter().map(|t| t.filename).collect();
        names.sort();
        assert_eq!(names, vec!["a.mp3", "c.mp3"]);
    }

    #[test]
    fn test_failed_existence_check_skips_record() {
        let (blobs, catalog, sync) = setup();
        catalog.set_failing(CatalogOp::Count, true);

        let report = sync.ingest(upload(&["x.mp3"])).unwrap();
        assert_eq!(report.check_failed, 1);
        assert_eq!(report.cataloged, 0);
        assert!(blobs.blob_exists("x.mp3"));
        assert_eq!(catalog.record_count(), 0);
    }

    #[test]
    fn test_traversal_names_are_flattened() {
        let (blobs, _, sync) = setup();
        sync.ingest(upload(&["../../evil.mp3", ".."])).unwrap();

        assert!(blobs.blob_exists("evil.mp3"));
        assert_eq!(blobs.blob_count(), 1);
        // the record keeps the name as uploaded
        let tracks = sync.listing().unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].filename, "../../evil.mp3");
        assert_eq!(tracks[0].path, "/songs/../../evil.mp3");
    }

    #[test]
    fn test_bulk_insert_failure_fails_batch_and_keeps_blobs() {
        let (blobs, catalog, sync) = setup();
        catalog.set_failing(CatalogOp::Insert, true);

        assert!(sync.ingest(upload(&["a.mp3", "b.mp3"])).is_err());
        assert_eq!(catalog.record_count(), 0);
        assert_eq!(blobs.blob_count(), 2);
    }

    #[test]
    fn test_bulk_insert_failure_with_compensation_removes_blobs() {
        let blobs = Arc::new(MockBlobStore::new());
        let catalog = Arc::new(MockCatalogStore::new());
        let sync = CatalogSynchronizer::new(blobs.clone(), catalog.clone()).with_compensation(true);

        catalog.insert_many(&[Track::new("old.mp3", 1)]).unwrap();
        blobs.put_blob("old.mp3", b"old").unwrap();
        catalog.set_failing(CatalogOp::Insert, true);

        assert!(sync.ingest(upload(&["old.mp3", "new.mp3"])).is_err());
        assert!(!blobs.blob_exists("new.mp3"));
        // duplicates were never staged, so their blob stays
        assert!(blobs.blob_exists("old.mp3"));
    }

    #[test]
    fn test_compensation_keeps_blob_of_existing_record() {
        let blobs = Arc::new(MockBlobStore::new());
        let catalog = Arc::new(MockCatalogStore::new());
        let sync = CatalogSynchronizer::new(blobs.clone(), catalog.clone()).with_compensation(true);

        sync.ingest(upload(&["x.mp3"])).unwrap();
        catalog.set_failing(CatalogOp::Insert, true);

        // flattens onto the blob of the catalogued x.mp3
        assert!(sync.ingest(upload(&["albums/x.mp3", "fresh.mp3"])).is_err());
        assert_eq!(catalog.count_by_filename("x.mp3").unwrap(), 1);
        assert!(blobs.blob_exists("x.mp3"));
        assert!(!blobs.blob_exists("fresh.mp3"));
    }

    #[test]
    fn test_compensation_keeps_catalogued_blob_written_this_batch() {
        let blobs = Arc::new(MockBlobStore::new());
        let catalog = Arc::new(MockCatalogStore::new());
        let sync = CatalogSynchronizer::new(blobs.clone(), catalog.clone()).with_compensation(true);

        // record without a blob; the upload restores the blob under that name
        catalog.insert_many(&[Track::new("y.mp3", 1)]).unwrap();
        catalog.set_failing(CatalogOp::Insert, true);

        assert!(sync.ingest(upload(&["mix/y.mp3"])).is_err());
        assert!(blobs.blob_exists("y.mp3"));
    }

    /// Blob store that remembers the `filename` log context seen by each removal
    #[derive(Default)]
    struct ContextRecordingBlobStore {
        inner: MockBlobStore,
        seen: std::sync::Mutex<Vec<Option<String>>>,
    }

    impl BlobStore for ContextRecordingBlobStore {
        fn put_blob(&self, name: &str, data: &[u8]) -> Result<(), crate::error::BlobError> {
            self.inner.put_blob(name, data)
        }
        fn remove_blob(&self, name: &str) -> Result<(), crate::error::BlobError> {
            let current = log_mdc::get("filename", |v| v.map(str::to_string));
            self.seen.lock().unwrap().push(current);
            self.inner.remove_blob(name)
        }
        fn blob_exists(&self, name: &str) -> bool {
            self.inner.blob_exists(name)
        }
        fn read_blob(&self, name: &str) -> Result<Vec<u8>, crate::error::BlobError> {
            self.inner.read_blob(name)
        }
        fn root(&self) -> Option<&std::path::Path> {
            None
        }
    }

    #[test]
    fn test_delete_sets_filename_log_context() {
        let blobs = Arc::new(ContextRecordingBlobStore::default());
        let catalog = Arc::new(MockCatalogStore::new());
        let sync = CatalogSynchronizer::new(blobs.clone(), catalog.clone());

        sync.ingest(upload(&["ctx.mp3"])).unwrap();
        sync.delete("ctx.mp3").unwrap();

        assert_eq!(*blobs.seen.lock().unwrap(), vec![Some("ctx.mp3".to_string())]);
        assert!(log_mdc::get("filename", |v| v.is_none()));
    }

    #[test]
    fn test_empty_batch_is_ok() {
        let (_, catalog, sync) = setup();
        catalog.set_failing(CatalogOp::Insert, true);
        let report = sync.ingest(Vec::new()).unwrap();
        assert_eq!(report, IngestReport::default());
    }

    #[test]
    fn test_listing_propagates_errors() {
        let (_, catalog, sync) = setup();
        catalog.set_failing(CatalogOp::Query, true);
        assert!(matches!(sync.listing(), Err(CatalogError::Unavailable(_))));
        assert!(sync.shuffled_listing().is_err());
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let (_, _, sync) = setup();
        let names: Vec<String> = (0..25).map(|i| format!("t{:02}.mp3", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        sync.ingest(upload(&refs)).unwrap();

        let mut listed = sync.listing().unwrap();
        for _ in 0..5 {
            let mut shuffled = sync.shuffled_listing().unwrap();
            shuffled.sort();
            listed.sort();
            assert_eq!(shuffled, listed);
        }
    }

    #[test]
    fn test_shuffle_with_injected_rng_is_reproducible() {
        let (_, _, sync) = setup();
        sync.ingest(upload(&["a.mp3", "b.mp3", "c.mp3", "d.mp3", "e.mp3", "f.mp3"])).unwrap();

        let first = sync.shuffled_listing_with(&mut StdRng::seed_from_u64(7)).unwrap();
        let second = sync.shuffled_listing_with(&mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(first, second);

        // some seed must move something out of insertion order
        let listed = sync.listing().unwrap();
        let reordered = (0..20u64).any(|seed| sync.shuffled_listing_with(&mut StdRng::seed_from_u64(seed)).unwrap() != listed);
        assert!(reordered);
    }

    #[test]
    fn test_delete_existing_track() {
        let (blobs, _, sync) = setup();
        sync.ingest(upload(&["track1.mp3", "track2.mp3"])).unwrap();

        let outcome = sync.delete("track1.mp3").unwrap();
        assert_eq!(outcome, DeleteOutcome { records_removed: 1, blob_removed: true });
        assert!(!blobs.blob_exists("track1.mp3"));

        let names: Vec<_> = sync.listing().unwrap().into_iter().map(|t| t.filename).collect();
        assert_eq!(names, vec!["track2.mp3"]);
    }

    #[test]
    fn test_delete_unknown_track_is_idempotent() {
        let (_, _, sync) = setup();
        let outcome = sync.delete("never-uploaded.mp3").unwrap();
        assert_eq!(outcome, DeleteOutcome { records_removed: 0, blob_removed: false });
        assert!(sync.delete("never-uploaded.mp3").is_ok());
    }

    #[test]
    fn test_delete_with_missing_blob_still_succeeds() {
        let (blobs, _, sync) = setup();
        sync.ingest(upload(&["gone.mp3"])).unwrap();
        blobs.remove_blob("gone.mp3").unwrap();

        let outcome = sync.delete("gone.mp3").unwrap();
        assert_eq!(outcome.records_removed, 1);
        assert!(!outcome.blob_removed);
    }

    #[test]
    fn test_delete_catalog_failure_is_reported() {
        let (blobs, catalog, sync) = setup();
        sync.ingest(upload(&["keep.mp3"])).unwrap();
        catalog.set_failing(CatalogOp::Delete, true);

        assert!(sync.delete("keep.mp3").is_err());
        // nothing is touched on disk when the catalog refuses
        assert!(blobs.blob_exists("keep.mp3"));
    }
}
