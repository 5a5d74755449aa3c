//! Read-only access to code hosting platforms: URL normalization into
//! repository coordinates and a cached GitHub REST client.

mod client;
mod coordinates;
mod error;

pub use client::{FileEntry, HostClient, HostConfig, RepoAnalysis, RepoMetadata, SearchHit};
pub use coordinates::{HostKind, RepoCoordinates};
pub use error::{CodehostError, Result};
