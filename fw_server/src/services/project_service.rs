//! Project upsert and lookup.
//!
//! Projects are created and renamed by webhook only; there is no deletion
//! path and no static project list.

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::models::project::{NewProject, Project};
use crate::schema::projects;

/// Upsert a project from a webhook, keyed by its repository.
pub async fn upsert_from_webhook(
    conn: &mut AsyncPgConnection,
    new_project: NewProject,
) -> anyhow::Result<Project> {
    let result = diesel::insert_into(projects::table)
        .values(&new_project)
        .on_conflict(projects::repository_slug)
        .do_update()
        .set((
            projects::name.eq(diesel::upsert::excluded(projects::name)),
            projects::updated_at.eq(diesel::dsl::now),
        ))
        .get_result::<Project>(conn)
        .await?;
    Ok(result)
}

/// Find a project by its URL slug.
pub async fn find_by_slug(
    conn: &mut AsyncPgConnection,
    slug: &str,
) -> anyhow::Result<Option<Project>> {
    let result = projects::table
        .filter(projects::slug.eq(slug))
        .first::<Project>(conn)
        .await
        .optional()?;
    Ok(result)
}
