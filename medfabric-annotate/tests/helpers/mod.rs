//! Shared fixtures for medfabric-annotate integration tests
#![allow(dead_code)]

use std::sync::Arc;

use medfabric_annotate::services::RootFolderLocator;
use medfabric_annotate::AnnotationEngine;
use medfabric_common::config::{AssignmentConfig, CriterionConfig};
use medfabric_common::db::init::init_database;
use medfabric_common::db::models::{Patient, Role};
use medfabric_common::events::EventBus;
use tempfile::TempDir;
use uuid::Uuid;

/// Engine over a fresh database; keep `_dir` alive for the test
pub struct TestContext {
    pub _dir: TempDir,
    pub engine: AnnotationEngine,
}

pub async fn setup() -> TestContext {
    setup_with(AssignmentConfig::default()).await
}

pub async fn setup_with(assignment: AssignmentConfig) -> TestContext {
    let dir = TempDir::new().expect("temp dir");
    let pool = init_database(&dir.path().join("medfabric.db"))
        .await
        .expect("init database");
    let engine = AnnotationEngine::new(
        pool,
        EventBus::new(64),
        CriterionConfig::default(),
        assignment,
        Arc::new(RootFolderLocator::for_root_folder(dir.path())),
    );
    TestContext { _dir: dir, engine }
}

/// Independent engine on the same database file, with its own pool and
/// write gate, standing in for a second process
pub async fn sibling_engine(ctx: &TestContext) -> AnnotationEngine {
    let pool = init_database(&ctx._dir.path().join("medfabric.db"))
        .await
        .expect("open database");
    AnnotationEngine::new(
        pool,
        EventBus::new(64),
        CriterionConfig::default(),
        AssignmentConfig::default(),
        Arc::new(RootFolderLocator::for_root_folder(ctx._dir.path())),
    )
}

/// Registered doctor with one active session: (doctor_id, session_id)
pub async fn reviewer(engine: &AnnotationEngine, username: &str) -> (Uuid, String) {
    engine
        .register_doctor(username, "secret", Role::Labeler)
        .await
        .expect("register");
    let session = engine.login(username, "secret").await.expect("login");
    (session.doctor_id, session.session_id.to_string())
}

/// Image ids follow `<set>-<slice>`
pub async fn add_set(engine: &AnnotationEngine, set_id: &str, patient: Option<&str>, slices: i64) {
    engine
        .add_image_set(set_id, slices, None, patient, None)
        .await
        .expect("add image set");
    for slice in 0..slices {
        engine
            .add_image(&format!("{}-{}", set_id, slice), set_id, slice)
            .await
            .expect("add image");
    }
}

pub async fn add_patient(engine: &AnnotationEngine, patient_id: &str) {
    engine
        .add_patient(Patient {
            patient_id: patient_id.to_string(),
            category: None,
            age: None,
            gender: None,
        })
        .await
        .expect("add patient");
}
