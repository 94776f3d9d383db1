//! Storage for the climate pipeline.
//!
//! Provides:
//! - The fetch ledger (SQLite) recording which partitions are local
//! - The warehouse (PostgreSQL, or in-memory for tests) holding raw and derived tables
//! - An upload-if-absent archive mirror to object storage (S3)
//! - The on-disk layout of the storage root

pub mod archive;
pub mod ledger;
pub mod paths;
pub mod warehouse;

pub use archive::{ArchiveConfig, ArchiveMirror, ArchiveReport};
pub use ledger::{FetchLedger, SqliteLedger};
pub use warehouse::{MemoryWarehouse, PgWarehouse, Warehouse, WriteMode};
