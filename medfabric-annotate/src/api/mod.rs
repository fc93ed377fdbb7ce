//! HTTP API handlers for medfabric-annotate
//!
//! Handlers are thin: they decode the request, call the engine and encode
//! the result. Reviewer and session ids always travel in the request.

pub mod assignments;
pub mod buildinfo;
pub mod conflicts;
pub mod doctors;
pub mod evaluations;
pub mod health;
pub mod reconcile;
pub mod sse;

pub use buildinfo::get_build_info;
pub use health::health_routes;
pub use sse::event_stream;
