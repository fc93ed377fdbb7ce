//! Annotation consensus services
//!
//! Write-path services operate on a caller-supplied connection so the
//! engine can run them inside its own transaction.

pub mod audit;
pub mod conflict_scanner;
pub mod consensus;
pub mod credentials;
pub mod evaluation_store;
pub mod ingest;
pub mod locator;
pub mod reconcile;
pub mod scheduler;
pub mod session_gate;
pub mod validator;

pub use conflict_scanner::{ConflictKey, ScanReport};
pub use credentials::{SecretHasher, Sha256SecretHasher};
pub use evaluation_store::{ImageEvaluationSubmission, ImageSetEvaluationSubmission};
pub use ingest::{IngestManifest, IngestSummary};
pub use locator::{RootFolderLocator, StorageLocator};
pub use reconcile::{reconcile, reconcile_named, ReconcileStrategy, NO_MAJORITY};
pub use scheduler::{Assignment, TaskScheduler};
pub use validator::ScoreValidator;
