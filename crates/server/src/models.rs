//! HTTP response bodies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Body of `GET /api/state`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateResponse {
    pub users: BTreeMap<String, u64>,
}

/// Body of `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerStatus {
    pub status: String,
    pub products: BTreeMap<String, u64>,
}
