use serde::{Deserialize, Serialize};

/// Unsigned, a negative offset is rejected before it reaches a store
#[derive(Debug, Serialize, Deserialize)]
pub struct PageQuery {
    #[serde(default)]
    pub skip: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    100
}

/// All three set selects the bucketed path
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct DataQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub bucket: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NearQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub radius: f64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchQuery {
    /// json object, e.g. `{"name":"Veloci"}`
    pub query: String,
    #[serde(default = "default_size")]
    pub size: usize,
    #[serde(default = "default_search_type")]
    pub search_type: String,
}

fn default_size() -> usize {
    10
}

fn default_search_type() -> String {
    "match".to_owned()
}
