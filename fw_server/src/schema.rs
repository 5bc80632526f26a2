//! Diesel table definitions for the firmware distribution service.
//!
//! Tables: projects, releases, processed_assets (the ingestion ledger).

diesel::table! {
    projects (id) {
        id -> Int8,
        slug -> Varchar,
        repository_slug -> Varchar,
        name -> Varchar,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    releases (id) {
        id -> Int8,
        project_id -> Int8,
        variant -> Varchar,
        version -> Varchar,
        major -> Int4,
        minor -> Int4,
        patch -> Int4,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    processed_assets (asset_id) {
        asset_id -> Int8,
        project_id -> Int8,
        created_at -> Timestamptz,
    }
}

// Foreign key relationships
diesel::joinable!(releases -> projects (project_id));
diesel::joinable!(processed_assets -> projects (project_id));

diesel::allow_tables_to_appear_in_same_query!(projects, releases, processed_assets);
