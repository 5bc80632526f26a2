//! Ingestion ledger row — an upstream asset id whose side effects are
//! complete. Append-only; existence is the whole contract.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::schema::processed_assets;

#[derive(Debug, Clone, Queryable, Selectable, Serialize)]
#[diesel(table_name = processed_assets)]
pub struct ProcessedAsset {
    pub asset_id: i64,
    pub project_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = processed_assets)]
pub struct NewProcessedAsset {
    pub asset_id: i64,
    pub project_id: i64,
}
