//! Annotation consensus engine
//!
//! Single entry point for the HTTP layer and the CLI. Writes take the
//! in-process write gate and run in one `BEGIN IMMEDIATE` transaction, which
//! also serializes them against other processes on the same database file.
//! Events are emitted only after the commit succeeds. Assignment selection
//! reads inside one read transaction; other reads go straight to the pool.

use std::sync::Arc;

use medfabric_common::config::{AssignmentConfig, AssignmentPolicy, CriterionConfig};
use medfabric_common::db::models::{
    Conflict, Doctor, Image, ImageEvaluation, ImageSet, ImageSetEvaluation, Patient, Region, Role,
    SessionRecord,
};
use medfabric_common::events::{EventBus, MedFabricEvent};
use medfabric_common::{time, uuid_utils, AuthError, ImageSetError, Result, SessionError};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::evaluations::SetScopedEvaluation;
use crate::db::{conflicts, doctors, evaluations, image_sets, images, sessions};
use crate::services::conflict_scanner::{self, ScanReport};
use crate::services::scheduler::{Assignment, TaskScheduler};
use crate::services::{
    consensus, credentials, evaluation_store, ingest, ImageEvaluationSubmission,
    ImageSetEvaluationSubmission, IngestManifest, IngestSummary, ReconcileStrategy,
    ScoreValidator, SecretHasher, Sha256SecretHasher, StorageLocator,
};

#[derive(Clone)]
pub struct AnnotationEngine {
    pool: SqlitePool,
    write_gate: Arc<Mutex<()>>,
    event_bus: EventBus,
    validator: ScoreValidator,
    scheduler: TaskScheduler,
    hasher: Arc<dyn SecretHasher>,
    locator: Arc<dyn StorageLocator>,
}

impl AnnotationEngine {
    pub fn new(
        pool: SqlitePool,
        event_bus: EventBus,
        criterion: CriterionConfig,
        assignment: AssignmentConfig,
        locator: Arc<dyn StorageLocator>,
    ) -> Self {
        Self {
            pool,
            write_gate: Arc::new(Mutex::new(())),
            event_bus,
            validator: ScoreValidator::new(criterion),
            scheduler: TaskScheduler::new(assignment),
            hasher: Arc::new(Sha256SecretHasher),
            locator,
        }
    }

    /// Replace the secret hashing scheme
    pub fn with_hasher(mut self, hasher: Arc<dyn SecretHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    // ------------------------------------------------------------------
    // Reviewers and sessions
    // ------------------------------------------------------------------

    pub async fn register_doctor(&self, username: &str, password: &str, role: Role) -> Result<Doctor> {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.begin_write().await?;
        let doctor =
            credentials::register_doctor(&mut *tx, self.hasher.as_ref(), username, password, role)
                .await?;
        tx.commit().await?;
        Ok(doctor)
    }

    /// Verify credentials and open a new active session
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionRecord> {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.begin_write().await?;
        let doctor =
            credentials::verify_credentials(&mut *tx, self.hasher.as_ref(), username, password)
                .await?;
        let session = open_session(&mut tx, doctor.doctor_id).await?;
        tx.commit().await?;

        self.emit_session_opened(&session);
        Ok(session)
    }

    pub async fn create_session(&self, doctor_id: Uuid) -> Result<SessionRecord> {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.begin_write().await?;
        if !doctors::exists(&mut *tx, doctor_id).await? {
            return Err(AuthError::UserNotFound(doctor_id.to_string()).into());
        }
        let session = open_session(&mut tx, doctor_id).await?;
        tx.commit().await?;

        self.emit_session_opened(&session);
        Ok(session)
    }

    /// Deactivate a session; calling it again on an inactive session is a no-op
    pub async fn deactivate_session(&self, session_id: &str) -> Result<SessionRecord> {
        let Some(parsed) = uuid_utils::parse(session_id) else {
            return Err(SessionError::NotFound(session_id.to_string()).into());
        };

        let _gate = self.write_gate.lock().await;
        let mut tx = self.begin_write().await?;
        let Some(mut session) = sessions::find_session(&mut *tx, parsed).await? else {
            return Err(SessionError::NotFound(session_id.to_string()).into());
        };
        let was_active = session.is_active;
        if was_active {
            sessions::deactivate(&mut *tx, parsed).await?;
            session.is_active = false;
        }
        tx.commit().await?;

        if was_active {
            tracing::info!(session_id = %parsed, doctor_id = %session.doctor_id, "Session closed");
            self.event_bus.emit_lossy(MedFabricEvent::SessionClosed {
                session_id: parsed,
                timestamp: time::now(),
            });
        }
        Ok(session)
    }

    pub async fn list_active_sessions(&self, doctor_id: Uuid) -> Result<Vec<SessionRecord>> {
        let mut conn = self.pool.acquire().await?;
        sessions::list_active(&mut conn, doctor_id).await
    }

    pub async fn doctor_exists(&self, doctor_id: Uuid) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        doctors::exists(&mut conn, doctor_id).await
    }

    pub async fn username_for(&self, doctor_id: Uuid) -> Result<Option<String>> {
        let mut conn = self.pool.acquire().await?;
        Ok(doctors::find_by_id(&mut conn, doctor_id).await?.map(|d| d.username))
    }

    pub async fn id_for_username(&self, username: &str) -> Result<Option<Uuid>> {
        let mut conn = self.pool.acquire().await?;
        Ok(doctors::find_by_username(&mut conn, username)
            .await?
            .map(|d| d.doctor_id))
    }

    // ------------------------------------------------------------------
    // Evaluation write path
    // ------------------------------------------------------------------

    pub async fn submit_image_evaluation(
        &self,
        submission: &ImageEvaluationSubmission,
    ) -> Result<SetScopedEvaluation> {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.begin_write().await?;
        let recorded =
            evaluation_store::submit_image_evaluation(&mut *tx, &self.validator, submission).await?;
        tx.commit().await?;

        self.event_bus.emit_lossy(MedFabricEvent::ImageEvaluationRecorded {
            evaluation_id: recorded.evaluation.id,
            doctor_id: recorded.evaluation.doctor_id,
            session_id: recorded.evaluation.session_id,
            image_set_id: recorded.image_set_id.clone(),
            image_id: recorded.evaluation.image_id.clone(),
            region: recorded.evaluation.region,
            timestamp: time::now(),
        });
        Ok(recorded)
    }

    pub async fn submit_image_set_evaluation(
        &self,
        submission: &ImageSetEvaluationSubmission,
    ) -> Result<ImageSetEvaluation> {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.begin_write().await?;
        let evaluation = evaluation_store::submit_image_set_evaluation(&mut *tx, submission).await?;
        tx.commit().await?;

        self.event_bus.emit_lossy(MedFabricEvent::ImageSetEvaluationRecorded {
            evaluation_id: evaluation.id,
            doctor_id: evaluation.doctor_id,
            session_id: evaluation.session_id,
            image_set_id: evaluation.image_set_id.clone(),
            is_low_quality: evaluation.is_low_quality,
            is_irrelevant: evaluation.is_irrelevant,
            timestamp: time::now(),
        });
        Ok(evaluation)
    }

    pub async fn retract_image_evaluation(
        &self,
        doctor_id: Uuid,
        session_id: &str,
        evaluation_id: i64,
    ) -> Result<ImageEvaluation> {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.begin_write().await?;
        let evaluation =
            evaluation_store::retract_image_evaluation(&mut *tx, doctor_id, session_id, evaluation_id)
                .await?;
        tx.commit().await?;

        self.event_bus.emit_lossy(MedFabricEvent::ImageEvaluationRetracted {
            evaluation_id,
            doctor_id,
            image_id: evaluation.image_id.clone(),
            timestamp: time::now(),
        });
        Ok(evaluation)
    }

    // ------------------------------------------------------------------
    // Scheduling and conflicts
    // ------------------------------------------------------------------

    pub async fn next_assignment(
        &self,
        doctor_id: Uuid,
        count: Option<usize>,
        policy: Option<AssignmentPolicy>,
    ) -> Result<Vec<Assignment>> {
        // One read transaction so every scheduler query sees the same snapshot
        let mut tx = self.pool.begin().await?;
        let batch = self
            .scheduler
            .next_assignment(&mut *tx, doctor_id, count, policy)
            .await?;
        tx.rollback().await?;
        Ok(batch)
    }

    /// One full scan in one transaction; a failure commits nothing
    pub async fn run_conflict_scan(&self) -> Result<ScanReport> {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.begin_write().await?;
        let report = conflict_scanner::run_scan(&mut *tx).await?;
        tx.commit().await?;

        tracing::info!(
            inserted = report.inserted,
            reopened = report.reopened,
            resolved = report.resolved,
            flags_changed = report.flags_changed,
            "Conflict scan committed"
        );
        self.event_bus.emit_lossy(MedFabricEvent::ConflictScanCompleted {
            inserted: report.inserted,
            reopened: report.reopened,
            resolved: report.resolved,
            flags_changed: report.flags_changed,
            timestamp: time::now(),
        });
        Ok(report)
    }

    /// Image sets the doctor evaluated in any session
    pub async fn evaluated_sets(&self, doctor_id: Uuid) -> Result<Vec<String>> {
        let mut conn = self.pool.acquire().await?;
        if !doctors::exists(&mut conn, doctor_id).await? {
            return Err(AuthError::UserNotFound(doctor_id.to_string()).into());
        }
        evaluations::evaluated_set_ids(&mut conn, doctor_id).await
    }

    pub async fn unresolved_conflicts(&self, image_set_id: &str) -> Result<Vec<Conflict>> {
        let mut conn = self.pool.acquire().await?;
        if !image_sets::exists(&mut conn, image_set_id).await? {
            return Err(ImageSetError::NotFound(image_set_id.to_string()).into());
        }
        conflicts::unresolved_for_set(&mut conn, image_set_id).await
    }

    pub async fn is_conflicted(&self, image_set_id: &str) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        image_sets::conflicted_flag(&mut conn, image_set_id)
            .await?
            .ok_or_else(|| ImageSetError::NotFound(image_set_id.to_string()).into())
    }

    pub async fn consensus_slice(
        &self,
        image_set_id: &str,
        region: Region,
        strategy: ReconcileStrategy,
    ) -> Result<Option<i64>> {
        let mut conn = self.pool.acquire().await?;
        consensus::consensus_slice(&mut conn, image_set_id, region, strategy).await
    }

    // ------------------------------------------------------------------
    // Corpus
    // ------------------------------------------------------------------

    pub async fn add_patient(&self, patient: Patient) -> Result<Patient> {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.begin_write().await?;
        let patient = ingest::add_patient(&mut *tx, patient).await?;
        tx.commit().await?;
        Ok(patient)
    }

    pub async fn add_image_set(
        &self,
        image_set_id: &str,
        num_images: i64,
        folder_path: Option<&str>,
        patient_id: Option<&str>,
        description: Option<&str>,
    ) -> Result<ImageSet> {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.begin_write().await?;
        let image_set = ingest::add_image_set(
            &mut *tx,
            image_set_id,
            num_images,
            folder_path,
            patient_id,
            description,
        )
        .await?;
        tx.commit().await?;
        Ok(image_set)
    }

    pub async fn add_image(&self, image_id: &str, image_set_id: &str, slice_index: i64) -> Result<Image> {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.begin_write().await?;
        let image = ingest::add_image(&mut *tx, image_id, image_set_id, slice_index).await?;
        tx.commit().await?;
        Ok(image)
    }

    /// Whole manifest in one transaction
    pub async fn ingest_manifest(&self, manifest: &IngestManifest) -> Result<IngestSummary> {
        let _gate = self.write_gate.lock().await;
        let mut tx = self.begin_write().await?;
        let summary = ingest::ingest_manifest(&mut *tx, manifest).await?;
        tx.commit().await?;
        Ok(summary)
    }

    /// Image set that the storage locator can place on disk
    pub async fn get_image_set_with_validation(&self, image_set_id: &str) -> Result<ImageSet> {
        let mut conn = self.pool.acquire().await?;
        let Some(image_set) = image_sets::find_image_set(&mut conn, image_set_id).await? else {
            return Err(ImageSetError::NotFound(image_set_id.to_string()).into());
        };
        if self.locator.locate(&image_set).is_none() {
            return Err(ImageSetError::InvalidPath(image_set_id.to_string()).into());
        }
        Ok(image_set)
    }

    pub async fn images_for_set(&self, image_set_id: &str) -> Result<Vec<Image>> {
        let mut conn = self.pool.acquire().await?;
        if !image_sets::exists(&mut conn, image_set_id).await? {
            return Err(ImageSetError::NotFound(image_set_id.to_string()).into());
        }
        images::list_for_set(&mut conn, image_set_id).await
    }

    /// Write transaction that takes the database write lock up front
    ///
    /// A deferred transaction that reads first cannot wait for another
    /// process's writer; it fails with SQLITE_BUSY on upgrade. `BEGIN IMMEDIATE`
    /// queues on the busy timeout instead, so duplicate checks see committed rows.
    async fn begin_write(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin_with("BEGIN IMMEDIATE").await?)
    }

    fn emit_session_opened(&self, session: &SessionRecord) {
        tracing::info!(session_id = %session.session_id, doctor_id = %session.doctor_id, "Session opened");
        self.event_bus.emit_lossy(MedFabricEvent::SessionOpened {
            session_id: session.session_id,
            doctor_id: session.doctor_id,
            timestamp: session.login_time,
        });
    }
}

async fn open_session(
    tx: &mut Transaction<'_, Sqlite>,
    doctor_id: Uuid,
) -> Result<SessionRecord> {
    let session = SessionRecord {
        session_id: uuid_utils::generate(),
        doctor_id,
        login_time: time::now(),
        is_active: true,
    };
    sessions::insert_session(&mut **tx, &session).await?;
    Ok(session)
}
