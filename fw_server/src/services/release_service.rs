//! Release index — insert-once records and latest-version lookup.

use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};

use crate::models::release::{NewRelease, Release};
use crate::schema::releases;

/// Insert a release row; a duplicate (project, variant, version) tuple is
/// ignored, not an error.
pub async fn insert_ignore(
    conn: &mut AsyncPgConnection,
    new_release: NewRelease,
) -> anyhow::Result<()> {
    diesel::insert_into(releases::table)
        .values(&new_release)
        .on_conflict_do_nothing()
        .execute(conn)
        .await?;
    Ok(())
}

/// The release with the greatest (major, minor, patch) for a project
/// variant — ordered on the parsed integer columns, never on the version
/// string.
pub async fn latest(
    conn: &mut AsyncPgConnection,
    project_id: i64,
    variant: &str,
) -> anyhow::Result<Option<Release>> {
    let result = releases::table
        .filter(releases::project_id.eq(project_id))
        .filter(releases::variant.eq(variant))
        .order((
            releases::major.desc(),
            releases::minor.desc(),
            releases::patch.desc(),
        ))
        .first::<Release>(conn)
        .await
        .optional()?;
    Ok(result)
}
