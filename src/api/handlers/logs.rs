//! Aggregated log endpoint

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::error;

use super::ServerState;
use crate::api::envelope::ApiErrorResponse;
use crate::storage::{read_all, ArtifactKey, ArtifactStore, DetectionIndex, StorageError};
use crate::types::SensorKind;

/// Every successfully parsed record in the consolidated store.
#[derive(Debug, Default, Serialize)]
pub struct AggregatedLogs {
    pub gps_log: Vec<Value>,
    pub accelerometer_log: Vec<Value>,
    pub gyroscope_log: Vec<Value>,
}

/// Collect the shared GPS log and every detection's inertial logs.
///
/// Corrupt lines are skipped (and logged) by the record reader.
pub fn aggregate_logs(
    store: &dyn ArtifactStore,
    index: &DetectionIndex,
) -> Result<AggregatedLogs, StorageError> {
    let mut logs = AggregatedLogs {
        gps_log: read_all::<Value>(store, &ArtifactKey::ConsolidatedGpsLog)?.collect(),
        ..AggregatedLogs::default()
    };

    for id in index.ids() {
        for sensor in SensorKind::ALL {
            let records = read_all::<Value>(store, &ArtifactKey::InertialLog(sensor, id.clone()))?;
            match sensor {
                SensorKind::Accelerometer => logs.accelerometer_log.extend(records),
                SensorKind::Gyroscope => logs.gyroscope_log.extend(records),
            }
        }
    }

    Ok(logs)
}

/// GET (any path) - Return all GPS, accelerometer and gyroscope records
pub async fn get_logs(State(state): State<ServerState>) -> Response {
    let (store, index) = (Arc::clone(&state.store), Arc::clone(&state.index));
    match tokio::task::spawn_blocking(move || aggregate_logs(store.as_ref(), &index)).await {
        Ok(Ok(logs)) => Json(logs).into_response(),
        Ok(Err(e)) => {
            error!(error = %e, "Failed to aggregate logs");
            ApiErrorResponse::internal("Server error")
        }
        Err(e) => {
            error!(error = %e, "Log aggregation task panicked");
            ApiErrorResponse::internal("Server error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use crate::types::DetectionId;

    #[test]
    fn test_aggregates_across_detections() {
        let store: Arc<dyn ArtifactStore> = Arc::new(InMemoryStore::new());
        let index = DetectionIndex::load(Arc::clone(&store)).unwrap();

        for n in [1, 2] {
            let id = DetectionId::from_sequence(n);
            index.register(&id).unwrap();
            store
                .append_line(
                    &ArtifactKey::InertialLog(SensorKind::Accelerometer, id.clone()),
                    r#"{"type":"accelerometer","x":1,"y":2,"z":3}"#,
                )
                .unwrap();
            store
                .append_line(&ArtifactKey::InertialLog(SensorKind::Gyroscope, id), "corrupt")
                .unwrap();
        }
        store
            .append_line(&ArtifactKey::ConsolidatedGpsLog, r#"{"latitude":1.0,"longitude":2.0}"#)
            .unwrap();

        let logs = aggregate_logs(store.as_ref(), &index).unwrap();
        assert_eq!(logs.gps_log.len(), 1);
        assert_eq!(logs.accelerometer_log.len(), 2);
        assert!(logs.gyroscope_log.is_empty());
    }
}
