//! Startup migration for the firmware distribution tables.

use diesel_async::{AsyncPgConnection, SimpleAsyncConnection};

/// SQL migration for the firmware distribution tables.
///
/// Creates projects, releases, and the processed_assets ledger. All
/// statements are idempotent so the migration can run on every boot.
pub const MIGRATION_SQL: &str = r#"
-- ================================================================
-- Firmware Distribution Tables
-- ================================================================

CREATE TABLE IF NOT EXISTS projects (
    id              BIGSERIAL PRIMARY KEY,
    slug            VARCHAR(255) NOT NULL UNIQUE,
    repository_slug VARCHAR(255) NOT NULL UNIQUE,
    name            VARCHAR(255) NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_projects_slug ON projects (slug);

CREATE TABLE IF NOT EXISTS releases (
    id              BIGSERIAL PRIMARY KEY,
    project_id      BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    variant         VARCHAR(255) NOT NULL,
    version         VARCHAR(64) NOT NULL,
    major           INTEGER NOT NULL,
    minor           INTEGER NOT NULL,
    patch           INTEGER NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (project_id, variant, version)
);

CREATE INDEX IF NOT EXISTS idx_releases_latest
    ON releases (project_id, variant, major DESC, minor DESC, patch DESC);

CREATE TABLE IF NOT EXISTS processed_assets (
    asset_id        BIGINT PRIMARY KEY,
    project_id      BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#;

/// Run the firmware distribution migration.
pub async fn run_migration(conn: &mut AsyncPgConnection) -> anyhow::Result<()> {
    conn.batch_execute(MIGRATION_SQL)
        .await
        .map_err(|e| anyhow::anyhow!("firmware migration failed: {e}"))?;
    Ok(())
}
