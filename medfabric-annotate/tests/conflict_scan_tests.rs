//! Conflict scanner: detection, resolve/reopen transitions, idempotence

mod helpers;

use helpers::{add_set, reviewer, setup};
use medfabric_annotate::services::{
    ImageEvaluationSubmission, ImageSetEvaluationSubmission, ReconcileStrategy, ScanReport,
};
use medfabric_common::db::models::{ConflictType, Region, ScoreField, ScoreSet};
use medfabric_common::{Error, ImageSetError};
use uuid::Uuid;

fn corona(value: i64) -> ScoreSet {
    ScoreSet::default()
        .with(ScoreField::CoronaLeft, value)
        .with(ScoreField::CoronaRight, value)
}

fn eval(doctor_id: Uuid, session: &str, image: &str, region: Region, scores: ScoreSet) -> ImageEvaluationSubmission {
    ImageEvaluationSubmission {
        doctor_id,
        image_id: image.to_string(),
        session_id: session.to_string(),
        region,
        scores,
        notes: Some("scan test".to_string()),
    }
}

#[tokio::test]
async fn test_classification_conflict_lifecycle() {
    let ctx = setup().await;
    add_set(&ctx.engine, "s1", None, 3).await;
    let (a, a_session) = reviewer(&ctx.engine, "house").await;
    let (b, b_session) = reviewer(&ctx.engine, "wilson").await;

    ctx.engine
        .submit_image_evaluation(&eval(a, &a_session, "s1-1", Region::CoronaRadiata, corona(2)))
        .await
        .unwrap();
    let disputed = ctx
        .engine
        .submit_image_evaluation(&eval(b, &b_session, "s1-1", Region::None, ScoreSet::default()))
        .await
        .unwrap();

    let report = ctx.engine.run_conflict_scan().await.unwrap();
    assert_eq!(report, ScanReport { inserted: 1, reopened: 0, resolved: 0, flags_changed: 1 });

    let conflicts = ctx.engine.unresolved_conflicts("s1").await.unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].conflict_type, ConflictType::Classification);
    assert_eq!(conflicts[0].image_id.as_deref(), Some("s1-1"));
    assert!(ctx.engine.is_conflicted("s1").await.unwrap());

    // Idempotent: nothing new, nothing changes
    assert!(ctx.engine.run_conflict_scan().await.unwrap().is_noop());

    // Remove one side of the disagreement
    ctx.engine
        .retract_image_evaluation(b, &b_session, disputed.evaluation.id)
        .await
        .unwrap();
    let report = ctx.engine.run_conflict_scan().await.unwrap();
    assert_eq!(report, ScanReport { inserted: 0, reopened: 0, resolved: 1, flags_changed: 1 });
    assert!(ctx.engine.unresolved_conflicts("s1").await.unwrap().is_empty());
    assert!(!ctx.engine.is_conflicted("s1").await.unwrap());
    assert!(ctx.engine.run_conflict_scan().await.unwrap().is_noop());

    // Disagreement returns in a new session: the same row is reopened
    let b_again = ctx.engine.create_session(b).await.unwrap().session_id.to_string();
    ctx.engine
        .submit_image_evaluation(&eval(b, &b_again, "s1-1", Region::BasalCortex, ScoreSet::default()
            .with(ScoreField::BasalCortexLeft, 1)
            .with(ScoreField::BasalCortexRight, 1)))
        .await
        .unwrap();
    let report = ctx.engine.run_conflict_scan().await.unwrap();
    assert_eq!(report, ScanReport { inserted: 0, reopened: 1, resolved: 0, flags_changed: 1 });
    assert!(ctx.engine.is_conflicted("s1").await.unwrap());
}

#[tokio::test]
async fn test_failed_scan_leaves_no_partial_state() {
    let ctx = setup().await;
    add_set(&ctx.engine, "s1", None, 1).await;
    let (a, a_session) = reviewer(&ctx.engine, "house").await;
    let (b, b_session) = reviewer(&ctx.engine, "wilson").await;
    ctx.engine
        .submit_image_evaluation(&eval(a, &a_session, "s1-0", Region::CoronaRadiata, corona(1)))
        .await
        .unwrap();
    ctx.engine
        .submit_image_evaluation(&eval(b, &b_session, "s1-0", Region::None, ScoreSet::default()))
        .await
        .unwrap();

    // Conflict rows are written before the flag update, which then fails
    sqlx::query(
        "CREATE TRIGGER block_flag BEFORE UPDATE ON image_sets \
         BEGIN SELECT RAISE(ABORT, 'flag update blocked'); END",
    )
    .execute(ctx.engine.pool())
    .await
    .unwrap();

    let err = ctx.engine.run_conflict_scan().await.unwrap_err();
    assert!(matches!(err, Error::Database(_)));

    let (stored,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conflicts")
        .fetch_one(ctx.engine.pool())
        .await
        .unwrap();
    assert_eq!(stored, 0);
    assert!(!ctx.engine.is_conflicted("s1").await.unwrap());

    sqlx::query("DROP TRIGGER block_flag")
        .execute(ctx.engine.pool())
        .await
        .unwrap();
    let report = ctx.engine.run_conflict_scan().await.unwrap();
    assert_eq!(report, ScanReport { inserted: 1, reopened: 0, resolved: 0, flags_changed: 1 });
    assert!(ctx.engine.is_conflicted("s1").await.unwrap());
}

#[tokio::test]
async fn test_score_conflict_only_on_relevant_disagreement() {
    let ctx = setup().await;
    add_set(&ctx.engine, "s1", None, 2).await;
    let (a, a_session) = reviewer(&ctx.engine, "house").await;
    let (b, b_session) = reviewer(&ctx.engine, "wilson").await;

    for (doctor, session, value) in [(a, &a_session, 1), (b, &b_session, 3)] {
        ctx.engine
            .submit_image_evaluation(&eval(doctor, session, "s1-0", Region::CoronaRadiata, corona(value)))
            .await
            .unwrap();
        ctx.engine
            .submit_image_evaluation(&eval(doctor, session, "s1-1", Region::CoronaRadiata, corona(2)))
            .await
            .unwrap();
    }

    ctx.engine.run_conflict_scan().await.unwrap();
    let conflicts = ctx.engine.unresolved_conflicts("s1").await.unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].conflict_type, ConflictType::Score);
    assert_eq!(conflicts[0].image_id.as_deref(), Some("s1-0"));
}

#[tokio::test]
async fn test_subject_level_disagreement_flags_set() {
    let ctx = setup().await;
    add_set(&ctx.engine, "s1", None, 1).await;
    add_set(&ctx.engine, "s2", None, 1).await;
    let (a, a_session) = reviewer(&ctx.engine, "house").await;
    let (b, b_session) = reviewer(&ctx.engine, "wilson").await;

    let verdict = |doctor_id: Uuid, session: &str, set: &str, low: bool, irrelevant: bool| {
        ImageSetEvaluationSubmission {
            doctor_id,
            image_set_id: set.to_string(),
            session_id: session.to_string(),
            is_low_quality: low,
            is_irrelevant: irrelevant,
        }
    };

    ctx.engine.submit_image_set_evaluation(&verdict(a, &a_session, "s1", true, false)).await.unwrap();
    ctx.engine.submit_image_set_evaluation(&verdict(b, &b_session, "s1", true, true)).await.unwrap();
    ctx.engine.submit_image_set_evaluation(&verdict(a, &a_session, "s2", false, true)).await.unwrap();
    ctx.engine.submit_image_set_evaluation(&verdict(b, &b_session, "s2", false, true)).await.unwrap();

    let report = ctx.engine.run_conflict_scan().await.unwrap();
    assert_eq!(report.inserted, 1);

    let conflicts = ctx.engine.unresolved_conflicts("s1").await.unwrap();
    assert_eq!(conflicts.len(), 1);
    assert_eq!(conflicts[0].image_id, None);
    assert_eq!(conflicts[0].conflict_type, ConflictType::Classification);
    assert!(ctx.engine.is_conflicted("s1").await.unwrap());
    assert!(!ctx.engine.is_conflicted("s2").await.unwrap());
}

#[tokio::test]
async fn test_conflict_queries_reject_unknown_set() {
    let ctx = setup().await;
    let err = ctx.engine.unresolved_conflicts("ghost").await.unwrap_err();
    assert!(matches!(err, Error::ImageSet(ImageSetError::NotFound(_))));
    let err = ctx.engine.is_conflicted("ghost").await.unwrap_err();
    assert!(matches!(err, Error::ImageSet(ImageSetError::NotFound(_))));
}

#[tokio::test]
async fn test_consensus_slice_across_reviewers() {
    let ctx = setup().await;
    add_set(&ctx.engine, "s1", None, 10).await;
    let reviewers = [
        reviewer(&ctx.engine, "house").await,
        reviewer(&ctx.engine, "wilson").await,
        reviewer(&ctx.engine, "cuddy").await,
    ];

    // house tags slices 4 and 6, wilson 5, cuddy 8
    let tags = [(0, 4), (0, 6), (1, 5), (2, 8)];
    for (who, slice) in tags {
        let (doctor, session) = &reviewers[who];
        ctx.engine
            .submit_image_evaluation(&eval(*doctor, session, &format!("s1-{}", slice), Region::CoronaRadiata, corona(1)))
            .await
            .unwrap();
    }

    let median = ctx
        .engine
        .consensus_slice("s1", Region::CoronaRadiata, ReconcileStrategy::Median)
        .await
        .unwrap();
    assert_eq!(median, Some(5));

    let mean = ctx
        .engine
        .consensus_slice("s1", Region::CoronaRadiata, ReconcileStrategy::Mean)
        .await
        .unwrap();
    assert_eq!(mean, Some(6)); // (4 + 5 + 8) / 3 = 5.67

    let untagged = ctx
        .engine
        .consensus_slice("s1", Region::BasalCentral, ReconcileStrategy::Mode)
        .await
        .unwrap();
    assert_eq!(untagged, None);
}
