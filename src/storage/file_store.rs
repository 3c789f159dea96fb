//! Flat-file artifact store
//!
//! Layout under the data directory:
//!
//! ```text
//! <data_dir>/Potholes/gps_log_<id>.txt              per-detection GPS fixes
//! <data_dir>/Potholes/detection_counter.txt         next-id counter
//! <data_dir>/Potholes/detection_index.log           detection index journal
//! <data_dir>/Pothole/consolidated_gps_log.txt       every GPS fix
//! <data_dir>/Pothole/accelerometer_log_<id>.txt
//! <data_dir>/Pothole/gyroscope_log_<id>.txt
//! <data_dir>/Pothole/<id>.jpg
//! <data_dir>/Pothole/summary_<id>.json
//! ```

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use super::{ArtifactKey, ArtifactStore, KeyLocks, LineIter, StorageError};
use crate::types::{DetectionId, SensorKind};

const UPLOAD_SUBDIR: &str = "Potholes";
const CONSOLIDATED_SUBDIR: &str = "Pothole";
const CONSOLIDATED_GPS_LOG: &str = "consolidated_gps_log.txt";
const COUNTER_FILE: &str = "detection_counter.txt";
const INDEX_FILE: &str = "detection_index.log";
const GPS_LOG_PREFIX: &str = "gps_log_";
const SUMMARY_PREFIX: &str = "summary_";
const TMP_SUFFIX: &str = ".tmp";

/// Artifact store backed by plain files.
pub struct FileArtifactStore {
    upload_dir: PathBuf,
    consolidated_dir: PathBuf,
    locks: KeyLocks,
}

impl FileArtifactStore {
    /// Open the store rooted at `data_dir`, creating its directories.
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, StorageError> {
        let data_dir = data_dir.as_ref();
        let upload_dir = data_dir.join(UPLOAD_SUBDIR);
        let consolidated_dir = data_dir.join(CONSOLIDATED_SUBDIR);

        for dir in [&upload_dir, &consolidated_dir] {
            fs::create_dir_all(dir).map_err(|e| StorageError::io(dir, e))?;
        }

        tracing::info!("Artifact store opened at {:?}", data_dir);

        Ok(Self {
            upload_dir,
            consolidated_dir,
            locks: KeyLocks::default(),
        })
    }

    /// Resolve the file backing an artifact.
    pub fn path_for(&self, key: &ArtifactKey) -> PathBuf {
        match key {
            ArtifactKey::GpsLog(id) => self.upload_dir.join(format!("{GPS_LOG_PREFIX}{id}.txt")),
            ArtifactKey::ConsolidatedGpsLog => self.consolidated_dir.join(CONSOLIDATED_GPS_LOG),
            ArtifactKey::InertialLog(kind, id) => {
                self.consolidated_dir.join(format!("{}_log_{id}.txt", kind.as_str()))
            }
            ArtifactKey::Image(id) => self.consolidated_dir.join(id.image_filename()),
            ArtifactKey::Summary(id) => {
                self.consolidated_dir.join(format!("{SUMMARY_PREFIX}{id}.json"))
            }
            ArtifactKey::DetectionIndex => self.upload_dir.join(INDEX_FILE),
            ArtifactKey::Counter => self.upload_dir.join(COUNTER_FILE),
        }
    }

    /// Recover the detection id encoded in a consolidated-dir file name.
    fn id_from_consolidated_name(name: &str) -> Option<DetectionId> {
        if name == CONSOLIDATED_GPS_LOG {
            return None;
        }
        for kind in SensorKind::ALL {
            let prefix = format!("{}_log_", kind.as_str());
            if let Some(id) = name.strip_prefix(&prefix).and_then(|r| r.strip_suffix(".txt")) {
                return DetectionId::parse(id);
            }
        }
        if let Some(id) = name
            .strip_prefix(SUMMARY_PREFIX)
            .and_then(|r| r.strip_suffix(".json"))
        {
            return DetectionId::parse(id);
        }
        name.strip_suffix(".jpg").and_then(DetectionId::parse)
    }

    fn tmp_path_for(path: &Path) -> PathBuf {
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(TMP_SUFFIX);
        PathBuf::from(tmp)
    }

    fn list_dir(dir: &Path) -> Result<Vec<(String, bool)>, StorageError> {
        let entries = fs::read_dir(dir).map_err(|e| StorageError::io(dir, e))?;
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(dir, e))?;
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            if let Some(name) = entry.file_name().to_str() {
                out.push((name.to_string(), is_dir));
            }
        }
        Ok(out)
    }
}

impl ArtifactStore for FileArtifactStore {
    fn append_line(&self, key: &ArtifactKey, line: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        self.locks.with(key, || {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| StorageError::io(&path, e))?;

            // Single write so the line and its terminator land together.
            let mut buf = Vec::with_capacity(line.len() + 1);
            buf.extend_from_slice(line.as_bytes());
            buf.push(b'\n');
            file.write_all(&buf).map_err(|e| StorageError::io(&path, e))
        })
    }

    fn read_lines(&self, key: &ArtifactKey) -> Result<LineIter, StorageError> {
        let path = self.path_for(key);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Box::new(std::iter::empty()));
            }
            Err(e) => return Err(StorageError::io(&path, e)),
        };

        let mut failed = false;
        let lines = BufReader::new(file).split(b'\n').map_while(move |chunk| {
            if failed {
                return None;
            }
            Some(match chunk {
                Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
                Err(e) => {
                    failed = true;
                    Err(StorageError::io(&path, e))
                }
            })
        });
        Ok(Box::new(lines))
    }

    /// Write to a sibling temp file, then rename it over the target, so
    /// readers see either the previous blob or the complete new one.
    fn write_blob(&self, key: &ArtifactKey, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp_path = Self::tmp_path_for(&path);
        self.locks.with(key, || {
            let mut file = File::create(&tmp_path).map_err(|e| StorageError::io(&tmp_path, e))?;
            file.write_all(bytes)
                .and_then(|()| file.sync_all())
                .map_err(|e| StorageError::io(&tmp_path, e))?;
            fs::rename(&tmp_path, &path).map_err(|e| StorageError::io(&path, e))
        })
    }

    fn read_blob(&self, key: &ArtifactKey) -> Result<Option<Vec<u8>>, StorageError> {
        let path = self.path_for(key);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }

    fn exists(&self, key: &ArtifactKey) -> bool {
        self.path_for(key).exists()
    }

    fn scan_detection_ids(&self) -> Result<Vec<DetectionId>, StorageError> {
        let mut ids = BTreeSet::new();

        for (name, is_dir) in Self::list_dir(&self.upload_dir)? {
            let id = if is_dir {
                // Legacy per-detection upload directories
                DetectionId::parse(&name)
            } else {
                name.strip_prefix(GPS_LOG_PREFIX)
                    .and_then(|r| r.strip_suffix(".txt"))
                    .and_then(DetectionId::parse)
            };
            ids.extend(id);
        }

        for (name, is_dir) in Self::list_dir(&self.consolidated_dir)? {
            if !is_dir {
                ids.extend(Self::id_from_consolidated_name(&name));
            }
        }

        Ok(ids.into_iter().collect())
    }

    fn backend_name(&self) -> &'static str {
        "FlatFile"
    }
}
