//! `GET /api/v1/admin/interfaces`: per-interface lifecycle state and
//! health status, surfaced for operators (spec.md §4.C/§4.G).

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct InterfaceReport {
    pub name: String,
    pub state: String,
    pub status: String,
    pub message: String,
}

pub async fn list_interfaces(State(state): State<AppState>) -> Json<Vec<InterfaceReport>> {
    let mut reports = Vec::new();
    for supervisor in state.process.interfaces().await {
        let status = supervisor.status().await;
        reports.push(InterfaceReport {
            name: supervisor.name().to_owned(),
            state: supervisor.state().to_string(),
            status: format!("{:?}", status.status),
            message: status.message,
        });
    }
    Json(reports)
}
