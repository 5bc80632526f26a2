//! A published firmware release, unique per (project, variant, version).
//!
//! major/minor/patch hold the parsed integer components used for ordering;
//! version keeps the raw string for display. Rows are written last in the
//! ingestion sequence and never updated afterwards.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::releases;

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = releases)]
pub struct Release {
    pub id: i64,
    pub project_id: i64,
    pub variant: String,
    pub version: String,
    pub major: i32,
    pub minor: i32,
    pub patch: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable, Deserialize)]
#[diesel(table_name = releases)]
pub struct NewRelease {
    pub project_id: i64,
    pub variant: String,
    pub version: String,
    pub major: i32,
    pub minor: i32,
    pub patch: i32,
}
