//! Demo tools exposed through `tools.run`
//!
//! Geocoding, point-of-interest search and route planning return canned data shaped
//! like a real mapping backend would. `echo` hands its arguments back unchanged.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::registry::{Registry, Tool};

pub const DEFAULT_POI_LIMIT: u32 = 5;
pub const MAX_POI_LIMIT: u32 = 50;

#[derive(Debug, Deserialize)]
pub struct GeocodeInput {
    pub address: String,
    #[serde(default)]
    pub city: String,
}

#[derive(Debug, Deserialize)]
pub struct PoiSearchInput {
    pub keywords: String,
    #[serde(default)]
    pub city: String,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RouteInput {
    pub origin: String,
    pub destination: String,
    #[serde(default)]
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodeResult {
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    pub city: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointOfInterest {
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    pub city: String,
}

pub fn register_tools(registry: &Registry) {
    registry.tools.register(Tool::new(
        "geocode",
        "Convert address to coordinates",
        |arguments: Value| -> Result<Value, AppError> {
            to_result(&geocode(decode_arguments(arguments)?))
        },
    ));
    registry.tools.register(Tool::new(
        "poi_search",
        "Search POI by keyword",
        |arguments: Value| -> Result<Value, AppError> {
            to_result(&poi_search(decode_arguments(arguments)?)?)
        },
    ));
    registry.tools.register(Tool::new(
        "route",
        "Route planning between two addresses",
        |arguments: Value| -> Result<Value, AppError> {
            Ok(route(decode_arguments(arguments)?))
        },
    ));
    registry.tools.register(Tool::new(
        "echo",
        "Return the arguments unchanged",
        |arguments: Value| -> Result<Value, AppError> { Ok(arguments) },
    ));
}

pub fn decode_arguments<T: DeserializeOwned>(arguments: Value) -> Result<T, AppError> {
    serde_json::from_value(arguments)
        .map_err(|err| AppError::invalid_params(format!("invalid tool arguments: {err}")))
}

fn to_result<T: Serialize>(value: &T) -> Result<Value, AppError> {
    serde_json::to_value(value)
        .map_err(|err| AppError::internal(format!("failed to serialize tool result: {err}")))
}

pub fn geocode(input: GeocodeInput) -> GeocodeResult {
    GeocodeResult {
        address: input.address,
        lat: 39.9042,
        lng: 116.4074,
        city: input.city,
    }
}

pub fn poi_search(input: PoiSearchInput) -> Result<Vec<PointOfInterest>, AppError> {
    if input.keywords.trim().is_empty() {
        return Err(AppError::invalid_params("keywords must not be empty"));
    }

    let limit = match input.limit {
        None | Some(0) => DEFAULT_POI_LIMIT,
        Some(limit) if limit > MAX_POI_LIMIT => {
            return Err(AppError::invalid_params(format!(
                "limit must not exceed {MAX_POI_LIMIT}"
            )))
        }
        Some(limit) => limit,
    };

    Ok((0..limit)
        .map(|index| PointOfInterest {
            name: format!("{}_POI_{}", input.keywords, index + 1),
            lat: 39.90 + f64::from(index) * 0.01,
            lng: 116.40 + f64::from(index) * 0.01,
            city: input.city.clone(),
        })
        .collect())
}

pub fn route(input: RouteInput) -> Value {
    json!({
        "origin": input.origin,
        "destination": input.destination,
        "mode": input.mode,
        "distance": "10km",
        "duration": "20min",
    })
}
