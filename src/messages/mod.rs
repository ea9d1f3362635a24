//! Message storage with reply threads. Not exposed over HTTP yet.

pub mod repo;
pub mod repo_types;
