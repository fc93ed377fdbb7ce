//! Task scheduler over a real database

mod helpers;

use std::collections::HashSet;

use helpers::{add_patient, add_set, reviewer, setup, setup_with};
use medfabric_annotate::services::{ImageEvaluationSubmission, ImageSetEvaluationSubmission};
use medfabric_common::config::{AssignmentConfig, AssignmentPolicy};
use medfabric_common::db::models::{Region, ScoreField, ScoreSet};
use medfabric_common::{AuthError, Error};
use uuid::Uuid;

async fn evaluate_image(ctx: &helpers::TestContext, doctor_id: Uuid, session: &str, image: &str, region: Region) {
    ctx.engine
        .submit_image_evaluation(&ImageEvaluationSubmission {
            doctor_id,
            image_id: image.to_string(),
            session_id: session.to_string(),
            region,
            scores: ScoreSet::default(),
            notes: None,
        })
        .await
        .unwrap();
}

async fn judge_set(ctx: &helpers::TestContext, doctor_id: Uuid, session: &str, set: &str) {
    ctx.engine
        .submit_image_set_evaluation(&ImageSetEvaluationSubmission {
            doctor_id,
            image_set_id: set.to_string(),
            session_id: session.to_string(),
            is_low_quality: false,
            is_irrelevant: true,
        })
        .await
        .unwrap();
}

fn ids(batch: &[medfabric_annotate::services::Assignment]) -> Vec<&str> {
    batch.iter().map(|a| a.image_set_id.as_str()).collect()
}

#[tokio::test]
async fn test_least_chosen_spreads_work_and_dedupes_patients() {
    let ctx = setup().await;
    for patient in ["p1", "p2", "p3"] {
        add_patient(&ctx.engine, patient).await;
    }
    add_set(&ctx.engine, "a", Some("p1"), 2).await;
    add_set(&ctx.engine, "b", Some("p1"), 2).await;
    add_set(&ctx.engine, "c", Some("p2"), 2).await;
    add_set(&ctx.engine, "d", Some("p3"), 2).await;
    add_set(&ctx.engine, "e", None, 2).await;

    let (other, other_session) = reviewer(&ctx.engine, "wilson").await;
    evaluate_image(&ctx, other, &other_session, "a-0", Region::None).await;
    evaluate_image(&ctx, other, &other_session, "a-1", Region::None).await;
    evaluate_image(&ctx, other, &other_session, "c-0", Region::None).await;

    let (me, _) = reviewer(&ctx.engine, "house").await;
    let batch = ctx
        .engine
        .next_assignment(me, Some(10), Some(AssignmentPolicy::LeastChosen))
        .await
        .unwrap();

    // Unrated first in ingestion order; "a" loses its patient slot to "b"
    assert_eq!(ids(&batch), vec!["b", "d", "e", "c"]);
    assert_eq!(batch[3].num_ratings, 1);

    let patients: Vec<_> = batch.iter().filter_map(|a| a.patient_id.clone()).collect();
    let unique: HashSet<_> = patients.iter().collect();
    assert_eq!(patients.len(), unique.len());
}

#[tokio::test]
async fn test_least_chosen_skips_own_and_agreed_irrelevant_sets() {
    let ctx = setup().await;
    for set in ["a", "b", "c", "d"] {
        add_set(&ctx.engine, set, None, 1).await;
    }
    let (me, my_session) = reviewer(&ctx.engine, "house").await;
    let (x, x_session) = reviewer(&ctx.engine, "wilson").await;
    let (y, y_session) = reviewer(&ctx.engine, "cuddy").await;

    evaluate_image(&ctx, me, &my_session, "a-0", Region::None).await;
    judge_set(&ctx, x, &x_session, "b").await;
    judge_set(&ctx, y, &y_session, "b").await;
    judge_set(&ctx, x, &x_session, "c").await;

    let batch = ctx.engine.next_assignment(me, Some(5), None).await.unwrap();
    // "b" is agreed irrelevant; "c" has only one verdict
    assert_eq!(ids(&batch), vec!["d", "c"]);
}

#[tokio::test]
async fn test_count_defaults_to_batch_size() {
    let ctx = setup_with(AssignmentConfig {
        batch_size: 2,
        ..AssignmentConfig::default()
    })
    .await;
    for set in ["a", "b", "c"] {
        add_set(&ctx.engine, set, None, 1).await;
    }
    let (me, _) = reviewer(&ctx.engine, "house").await;

    assert_eq!(ctx.engine.next_assignment(me, None, None).await.unwrap().len(), 2);
    assert_eq!(
        ctx.engine
            .next_assignment(me, Some(3), Some(AssignmentPolicy::Random))
            .await
            .unwrap()
            .len(),
        3
    );
}

#[tokio::test]
async fn test_skip_conflicted_policy() {
    let ctx = setup_with(AssignmentConfig {
        skip_conflicted: true,
        ..AssignmentConfig::default()
    })
    .await;
    add_set(&ctx.engine, "a", None, 1).await;
    add_set(&ctx.engine, "b", None, 1).await;
    let (x, x_session) = reviewer(&ctx.engine, "wilson").await;
    let (y, y_session) = reviewer(&ctx.engine, "cuddy").await;
    evaluate_image(&ctx, x, &x_session, "a-0", Region::None).await;
    ctx.engine
        .submit_image_evaluation(&ImageEvaluationSubmission {
            doctor_id: y,
            image_id: "a-0".to_string(),
            session_id: y_session.clone(),
            region: Region::CoronaRadiata,
            scores: ScoreSet::default()
                .with(ScoreField::CoronaLeft, 1)
                .with(ScoreField::CoronaRight, 1),
            notes: None,
        })
        .await
        .unwrap();
    ctx.engine.run_conflict_scan().await.unwrap();
    assert!(ctx.engine.is_conflicted("a").await.unwrap());

    let (me, _) = reviewer(&ctx.engine, "house").await;
    let batch = ctx.engine.next_assignment(me, Some(5), None).await.unwrap();
    assert_eq!(ids(&batch), vec!["b"]);
}

#[tokio::test]
async fn test_unknown_doctor_is_rejected() {
    let ctx = setup().await;
    let err = ctx.engine.next_assignment(Uuid::new_v4(), None, None).await.unwrap_err();
    assert!(matches!(err, Error::Auth(AuthError::UserNotFound(_))));
}

#[tokio::test]
async fn test_assignment_reads_committed_snapshot_without_waiting() {
    let ctx = setup().await;
    add_set(&ctx.engine, "a", None, 1).await;
    add_set(&ctx.engine, "b", None, 1).await;
    let (x, x_session) = reviewer(&ctx.engine, "wilson").await;
    let (y, y_session) = reviewer(&ctx.engine, "cuddy").await;
    let (me, _) = reviewer(&ctx.engine, "house").await;

    // Another writer holds the lock with two agreeing verdicts not yet committed
    let mut writer = ctx.engine.pool().begin_with("BEGIN IMMEDIATE").await.unwrap();
    for (doctor, session) in [(x, &x_session), (y, &y_session)] {
        sqlx::query(
            "INSERT INTO image_set_evaluations \
             (doctor_id, image_set_id, session_id, is_low_quality, is_irrelevant, created_at) \
             VALUES (?, 'a', ?, 0, 1, '2024-01-01T00:00:00Z')",
        )
        .bind(doctor.to_string())
        .bind(session)
        .execute(&mut *writer)
        .await
        .unwrap();
    }

    let batch = tokio::time::timeout(
        std::time::Duration::from_secs(2),
        ctx.engine.next_assignment(me, Some(5), None),
    )
    .await
    .expect("assignment waited on the writer")
    .unwrap();
    assert_eq!(ids(&batch), vec!["a", "b"]);

    writer.commit().await.unwrap();
    let batch = ctx.engine.next_assignment(me, Some(5), None).await.unwrap();
    assert_eq!(ids(&batch), vec!["b"]);
}
