//! Persistence for repositories and commits.
//!
//! [`RepoStore`] is the contract the ingestion core writes through.
//! [`PgRepoStore`] backs it with PostgreSQL; [`MemoryRepoStore`] keeps
//! everything in process for tests and local runs.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod traits;

pub use error::StoreError;
pub use memory::MemoryRepoStore;
pub use postgres::{init_pg_pool, PgRepoStore};
pub use traits::RepoStore;
