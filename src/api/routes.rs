use std::collections::BTreeMap;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::AppState;
use super::error::ApiError;
use crate::persistence::DeviceStore;
use crate::registry::{Attribute, Device, DeviceFilter, DeviceReport, Liveness};

pub const SERVICE_NAME: &str = env!("CARGO_PKG_NAME");
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Query string of `GET /devices`. `ids` is comma separated.
#[derive(Debug, Default, Deserialize)]
pub struct DevicesQuery {
    pub ids: Option<String>,
    pub state: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(rename = "ref")]
    pub reference: Option<String>,
}

impl DevicesQuery {
    pub fn into_filter(self) -> Result<DeviceFilter, ApiError> {
        let liveness = match non_empty(self.state) {
            Some(state) => Some(state.parse::<Liveness>()?),
            None => None,
        };
        Ok(DeviceFilter {
            ids: self
                .ids
                .as_deref()
                .map(parse_list)
                .unwrap_or_default(),
            liveness,
            kind: non_empty(self.kind),
            reference: non_empty(self.reference),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct UserDataBody {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Deserialize)]
pub struct ProvisionBody {
    #[serde(rename = "ref")]
    pub reference: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub state: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

#[derive(Debug, Deserialize)]
pub struct StateBody {
    pub state: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StateChanged {
    pub changed: usize,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceInfo {
    pub name: String,
    pub version: String,
    pub up_time_secs: i64,
}

pub async fn list_devices<S: DeviceStore>(
    State(state): State<AppState<S>>,
    query: Result<Query<DevicesQuery>, QueryRejection>,
) -> Result<Json<BTreeMap<String, Device>>, ApiError> {
    let Query(query) = query?;
    let filter = query.into_filter()?;
    let devices = state.registry.list(state.deadline(), &filter).await?;
    Ok(Json(devices))
}

pub async fn get_device<S: DeviceStore>(
    State(state): State<AppState<S>>,
    id: Result<Path<String>, PathRejection>,
) -> Result<Json<Device>, ApiError> {
    let Path(id) = id?;
    let device = state.registry.get(state.deadline(), &id).await?;
    Ok(Json(device))
}

pub async fn update_user_data<S: DeviceStore>(
    State(state): State<AppState<S>>,
    id: Result<Path<String>, PathRejection>,
    body: Result<Json<UserDataBody>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    let Json(body) = body?;
    state
        .registry
        .set_user_data(state.deadline(), &id, body.name, body.attributes)
        .await?;
    Ok(StatusCode::OK)
}

pub async fn delete_device<S: DeviceStore>(
    State(state): State<AppState<S>>,
    id: Result<Path<String>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    state.registry.delete(state.deadline(), &id).await?;
    Ok(StatusCode::OK)
}

pub async fn put_device<S: DeviceStore>(
    State(state): State<AppState<S>>,
    id: Result<Path<String>, PathRejection>,
    body: Result<Json<ProvisionBody>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    let Json(body) = body?;
    let report = DeviceReport {
        id,
        reference: body.reference,
        name: body.name,
        liveness: body.state.parse()?,
        kind: body.kind,
        attributes: body.attributes,
    };
    state.registry.upsert(state.deadline(), report).await?;
    Ok(StatusCode::OK)
}

pub async fn put_reference_state<S: DeviceStore>(
    State(state): State<AppState<S>>,
    reference: Result<Path<String>, PathRejection>,
    body: Result<Json<StateBody>, JsonRejection>,
) -> Result<Json<StateChanged>, ApiError> {
    let Path(reference) = reference?;
    let Json(body) = body?;
    let liveness: Liveness = body.state.parse()?;
    let changed = state
        .registry
        .mark_liveness(state.deadline(), &reference, liveness)
        .await?;
    Ok(Json(StateChanged { changed }))
}

pub async fn service_info<S: DeviceStore>(State(state): State<AppState<S>>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        name: SERVICE_NAME.to_string(),
        version: SERVICE_VERSION.to_string(),
        up_time_secs: (Utc::now() - state.started).num_seconds(),
    })
}

pub async fn health_check<S: DeviceStore>(State(state): State<AppState<S>>) -> Result<StatusCode, ApiError> {
    state
        .registry
        .list(state.deadline(), &DeviceFilter::default())
        .await?;
    Ok(StatusCode::OK)
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
