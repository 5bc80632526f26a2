//! Firmware distribution services — ingestion, resolution, storage.

pub mod credential_service;
pub mod github_service;
pub mod ingest;
pub mod key_encoding;
pub mod ledger_service;
pub mod manifest;
pub mod ota_service;
pub mod project_service;
pub mod queue;
pub mod release_service;
pub mod storage;
