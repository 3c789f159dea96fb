//! Consolidation Integration Tests
//!
//! Drives ingestion and consolidation against a real data directory and
//! checks the files left on disk.

use pothole_ingest::config::ServerConfig;
use pothole_ingest::consolidation::{ConsolidationEngine, GpsScope, SeverityClassifier};
use pothole_ingest::ingest::IngestRouter;
use pothole_ingest::storage::{
    read_all, ArtifactKey, ArtifactStore, DetectionIndex, DetectionStatus, FileArtifactStore,
};
use pothole_ingest::types::{DetectionId, InertialSample, SensorKind, SeverityTier};

use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

struct Harness {
    store: Arc<dyn ArtifactStore>,
    index: Arc<DetectionIndex>,
    router: IngestRouter,
    engine: ConsolidationEngine,
}

fn harness(data_dir: &Path) -> Harness {
    let store: Arc<dyn ArtifactStore> = Arc::new(FileArtifactStore::open(data_dir).unwrap());
    let index = Arc::new(DetectionIndex::load(Arc::clone(&store)).unwrap());
    let router = IngestRouter::new(Arc::clone(&store), Arc::clone(&index));
    let engine = ConsolidationEngine::new(
        Arc::clone(&store),
        Arc::clone(&index),
        SeverityClassifier::default(),
        GpsScope::PerDetection,
    );
    Harness {
        store,
        index,
        router,
        engine,
    }
}

fn id(n: u64) -> DetectionId {
    DetectionId::from_sequence(n)
}

impl Harness {
    fn complete(&self, n: u64, acc_z: f64, gyro_z: f64) {
        let detection = id(n);
        self.router
            .ingest_json(&detection, br#"{"latitude":40.7128,"longitude":-74.006}"#)
            .unwrap();
        self.router
            .ingest_json(
                &detection,
                format!(r#"{{"type":"accelerometer","x":0,"y":0,"z":{acc_z}}}"#).as_bytes(),
            )
            .unwrap();
        self.router
            .ingest_json(
                &detection,
                format!(r#"{{"type":"gyroscope","x":0,"y":0,"z":{gyro_z}}}"#).as_bytes(),
            )
            .unwrap();
        self.router.ingest_image(&detection, &[0xff, 0xd8, 0xff]).unwrap();
    }
}

#[test]
fn test_severe_detection_summary_on_disk() {
    let dir = tempdir().unwrap();
    let h = harness(dir.path());

    let detection = id(1);
    h.router
        .ingest_json(&detection, br#"{"latitude":40.7128,"longitude":-74.006}"#)
        .unwrap();
    h.router
        .ingest_json(&detection, br#"{"type":"accelerometer","x":1.5,"y":-2.0,"z":30.2}"#)
        .unwrap();
    h.router
        .ingest_json(&detection, br#"{"type":"gyroscope","x":0.1,"y":0.2,"z":0.3}"#)
        .unwrap();
    h.router.ingest_image(&detection, &[0xff, 0xd8, 0xff]).unwrap();

    let report = h.engine.consolidate().unwrap();
    assert_eq!(report.summarized, vec![id(1)]);

    let written = fs::read_to_string(dir.path().join("Pothole/summary_detection#1.json")).unwrap();
    assert_eq!(
        written,
        "{\n    \"latitude\": 40.7128,\n    \"longitude\": -74.006,\n    \"severity\": \"Severe Pothole\",\n    \"image\": \"detection#1.jpg\"\n}"
    );
    assert!(dir.path().join("Pothole/detection#1.jpg").exists());
    assert!(dir.path().join("Potholes/gps_log_detection#1.txt").exists());
    assert!(dir.path().join("Pothole/consolidated_gps_log.txt").exists());
}

#[test]
fn test_missing_gyroscope_leaves_no_summary() {
    let dir = tempdir().unwrap();
    let h = harness(dir.path());

    let detection = id(4);
    h.router
        .ingest_json(&detection, br#"{"latitude":1.0,"longitude":2.0}"#)
        .unwrap();
    h.router
        .ingest_json(&detection, br#"{"type":"accelerometer","x":1,"y":2,"z":3}"#)
        .unwrap();
    h.router.ingest_image(&detection, &[0xff]).unwrap();

    let report = h.engine.consolidate().unwrap();
    assert_eq!(report.pending, vec![id(4)]);
    assert!(!dir.path().join("Pothole/summary_detection#4.json").exists());
    assert_eq!(h.index.status(&id(4)), Some(DetectionStatus::Pending));
}

#[test]
fn test_rerun_is_byte_identical() {
    let dir = tempdir().unwrap();
    let h = harness(dir.path());
    h.complete(1, 5.0, 14.0);
    h.complete(2, 26.0, 1.0);

    h.engine.consolidate().unwrap();
    let path = dir.path().join("Pothole/summary_detection#2.json");
    let first = fs::read(&path).unwrap();

    let report = h.engine.consolidate().unwrap();
    assert!(report.summarized.is_empty());
    assert_eq!(report.already_summarized, 2);
    assert_eq!(fs::read(&path).unwrap(), first);
}

/// Tier boundaries are strict: exactly 25 is Moderate, exactly 13 is Minor.
#[test]
fn test_threshold_boundaries() {
    let dir = tempdir().unwrap();
    let h = harness(dir.path());
    h.complete(1, 25.0, 0.0);
    h.complete(2, 25.01, 0.0);
    h.complete(3, 13.0, 0.0);
    h.complete(4, 0.0, 13.5);

    h.engine.consolidate().unwrap();

    let tier = |n| h.engine.summary(&id(n)).unwrap().severity;
    assert_eq!(tier(1), SeverityTier::Moderate);
    assert_eq!(tier(2), SeverityTier::Severe);
    assert_eq!(tier(3), SeverityTier::Minor);
    assert_eq!(tier(4), SeverityTier::Moderate);
}

#[test]
fn test_corrupt_line_skipped() {
    let dir = tempdir().unwrap();
    let h = harness(dir.path());

    let key = ArtifactKey::InertialLog(SensorKind::Accelerometer, id(1));
    h.store.append_line(&key, r#"{"x":1,"y":2,"z":3}"#).unwrap();
    h.store.append_line(&key, r#"{"x":1,"y":"#).unwrap();
    h.store.append_line(&key, r#"{"x":4,"y":5,"z":6}"#).unwrap();

    let mut stream = read_all::<InertialSample>(h.store.as_ref(), &key).unwrap();
    let samples: Vec<_> = stream.by_ref().collect();
    assert_eq!(samples.len(), 2);
    assert_eq!(stream.skipped(), 1);
}

#[test]
fn test_restart_reloads_index_and_summaries() {
    let dir = tempdir().unwrap();
    {
        let h = harness(dir.path());
        h.complete(1, 30.0, 0.0);
        h.router
            .ingest_json(&id(2), br#"{"latitude":1.0,"longitude":2.0}"#)
            .unwrap();
        h.engine.consolidate().unwrap();
    }

    let h = harness(dir.path());
    assert_eq!(h.index.ids(), vec![id(1), id(2)]);
    assert_eq!(h.index.status(&id(1)), Some(DetectionStatus::Summarized));
    assert_eq!(h.index.pending(), vec![id(2)]);

    let listed = h.engine.summaries();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].1.severity, SeverityTier::Severe);
}

#[test]
fn test_configured_thresholds_apply() {
    let config = ServerConfig::from_toml(
        "[classification]\nsevere_above = 50.0\nmoderate_above = 20.0\n",
    )
    .unwrap();

    let dir = tempdir().unwrap();
    let store: Arc<dyn ArtifactStore> = Arc::new(FileArtifactStore::open(dir.path()).unwrap());
    let index = Arc::new(DetectionIndex::load(Arc::clone(&store)).unwrap());
    let router = IngestRouter::new(Arc::clone(&store), Arc::clone(&index));
    let engine = ConsolidationEngine::new(
        Arc::clone(&store),
        Arc::clone(&index),
        config.classification.classifier(),
        config.consolidation.gps_scope,
    );
    let h = Harness {
        store,
        index,
        router,
        engine,
    };
    h.complete(1, 30.0, 0.0);

    h.engine.consolidate().unwrap();
    assert_eq!(h.engine.summary(&id(1)).unwrap().severity, SeverityTier::Moderate);
}

#[test]
fn test_truncated_summary_on_disk_is_rebuilt() {
    let dir = tempdir().unwrap();
    let h = harness(dir.path());
    h.complete(1, 30.0, 0.0);

    let path = dir.path().join("Pothole/summary_detection#1.json");
    fs::write(&path, "{\n    \"lat").unwrap();

    let report = h.engine.consolidate().unwrap();
    assert_eq!(report.summarized, vec![id(1)]);
    assert_eq!(h.engine.summary(&id(1)).unwrap().severity, SeverityTier::Severe);
    assert!(!dir.path().join("Pothole/summary_detection#1.json.tmp").exists());

    let rebuilt = fs::read(&path).unwrap();
    let report = h.engine.consolidate().unwrap();
    assert_eq!(report.already_summarized, 1);
    assert_eq!(fs::read(&path).unwrap(), rebuilt);
}

#[test]
fn test_empty_counter_does_not_block_startup() {
    use pothole_ingest::storage::DetectionCounter;

    let dir = tempdir().unwrap();
    {
        let h = harness(dir.path());
        h.complete(3, 1.0, 1.0);
    }
    fs::write(dir.path().join("Potholes/detection_counter.txt"), "").unwrap();

    let store: Arc<dyn ArtifactStore> = Arc::new(FileArtifactStore::open(dir.path()).unwrap());
    let counter = DetectionCounter::open(store).unwrap();
    assert_eq!(counter.next().unwrap(), id(4));
}
