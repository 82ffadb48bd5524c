//! rollcall-store — SQLite record stores and the filesystem blob store.
//!
//! Implements the collaborator traits that `rollcall-core` orchestrates
//! against, plus the plain HR record stores (attendance, leaves,
//! assignments) that sit around the face subsystem.

pub mod assignments;
pub mod attendance;
pub mod blob;
pub mod db;
pub mod faces;
pub mod leaves;
pub mod users;

pub use blob::FsBlobStore;
pub use db::Db;
pub use faces::SqliteFaceStore;
pub use users::SqliteUserStore;
