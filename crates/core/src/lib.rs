//! Asset/variant lineage graph model.
//!
//! Holds the client-side mirror of a space's assets, variants and lineage
//! edges, the tracker for in-flight generation jobs, and the resolver that
//! measures thumbnail sizes for layout. Nothing in this crate performs
//! network I/O directly; collaborators are reached through the traits in
//! [`dimensions`].

pub mod dimensions;
pub mod error;
pub mod jobs;
pub mod model;
pub mod recipe;
pub mod types;
