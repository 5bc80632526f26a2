//! Ingestion ledger — the idempotency gate for upstream asset ids.
//!
//! A ledger row means every side effect for that asset is complete. The
//! pipeline checks here before doing work and marks here after; between
//! those two points everything must be safe to repeat.

use std::collections::HashSet;

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::models::processed_asset::NewProcessedAsset;
use crate::schema::processed_assets;

/// Which of `ids` already have a ledger row.
pub async fn processed_ids(
    conn: &mut AsyncPgConnection,
    ids: &[i64],
) -> anyhow::Result<HashSet<i64>> {
    if ids.is_empty() {
        return Ok(HashSet::new());
    }
    let rows: Vec<i64> = processed_assets::table
        .filter(processed_assets::asset_id.eq_any(ids))
        .select(processed_assets::asset_id)
        .load(conn)
        .await?;
    Ok(rows.into_iter().collect())
}

/// Record an asset as fully processed. A second call for the same id is a
/// no-op, not an error.
pub async fn mark_processed(
    conn: &mut AsyncPgConnection,
    asset_id: i64,
    project_id: i64,
) -> anyhow::Result<()> {
    diesel::insert_into(processed_assets::table)
        .values(&NewProcessedAsset {
            asset_id,
            project_id,
        })
        .on_conflict_do_nothing()
        .execute(conn)
        .await?;
    Ok(())
}
