use std::collections::BTreeMap;

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::admin::AdminState;
use crate::refresh::StatusReport;

#[derive(Serialize)]
pub struct ClientStatus {
    pub version: &'static str,
    pub snapshot_version: String,
    pub keys: usize,
    pub refresh: StatusReport,
}

#[derive(Serialize)]
pub struct SnapshotView {
    pub version: String,
    pub values: BTreeMap<String, String>,
}

#[derive(Serialize)]
pub struct RefreshAccepted {
    pub status: &'static str,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<ClientStatus> {
    let snapshot = state.store.read();
    Json(ClientStatus {
        version: env!("CARGO_PKG_VERSION"),
        snapshot_version: snapshot.version().to_string(),
        keys: snapshot.len(),
        refresh: state.refresh.status().report(),
    })
}

pub async fn get_snapshot(State(state): State<AdminState>) -> Json<SnapshotView> {
    let snapshot = state.store.read();
    Json(SnapshotView {
        version: snapshot.version().to_string(),
        values: snapshot.values().clone(),
    })
}

pub async fn post_refresh(State(state): State<AdminState>) -> (StatusCode, Json<RefreshAccepted>) {
    tracing::info!("Refresh requested via admin API");
    state.refresh.trigger();
    (
        StatusCode::ACCEPTED,
        Json(RefreshAccepted {
            status: "refresh scheduled",
        }),
    )
}
