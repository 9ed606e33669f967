//! Source-hosting API client.
//!
//! This crate provides:
//! - `GitHost` trait: the three read-only calls the ingestion core consumes
//! - `GitHostError`: rate-limited vs. unavailable, nothing else
//! - `GithubClient`: the GitHub REST implementation

pub mod client;
pub mod payload;
pub mod traits;

pub use client::GithubClient;
pub use traits::{GitHost, GitHostError};
