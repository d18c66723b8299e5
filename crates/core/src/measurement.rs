//! The measurement unit produced by a capture run.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One plate measurement, as identified and progressively enriched by the
/// capture pipeline stages.
///
/// `id` is `None` until the measurement has been registered with the
/// measurement sink, which assigns the durable id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Measurement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub barcode: String,
    #[serde(default)]
    pub rows: u32,
    #[serde(default)]
    pub columns: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub well_columns: Vec<String>,
    /// Column name -> one value per well, row-major.
    #[serde(
        default,
        rename = "welldata",
        skip_serializing_if = "HashMap::is_empty"
    )]
    pub well_data: HashMap<String, Vec<f64>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_well_columns: Vec<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub sub_well_data: HashMap<String, Vec<f64>>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}
