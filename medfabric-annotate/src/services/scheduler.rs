//! Task scheduler
//!
//! Picks the next batch of image sets for a reviewer. Selection is read-only;
//! rating counts only grow when evaluations are actually submitted.
//!
//! `LeastChosen` drops sets the reviewer already evaluated and sets that
//! enough reviewers agree are irrelevant or low quality, then orders the rest
//! by rating count (ties by ingestion order) and keeps one set per patient.
//! `Random` samples the whole corpus uniformly for spot checks.

use std::collections::{HashMap, HashSet};

use medfabric_common::config::{AssignmentConfig, AssignmentPolicy};
use medfabric_common::db::models::{ImageSet, ImageSetEvaluation};
use medfabric_common::{AuthError, Result};
use rand::seq::SliceRandom;
use serde::Serialize;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::db::{doctors, evaluations, image_sets};

/// One image set handed to a reviewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub image_set_id: String,
    pub patient_id: Option<String>,
    pub num_images: i64,
    pub num_ratings: i64,
    #[serde(skip)]
    pub set_index: i64,
}

impl Assignment {
    fn from_set(set: &ImageSet, num_ratings: i64) -> Self {
        Self {
            image_set_id: set.image_set_id.clone(),
            patient_id: set.patient_id.clone(),
            num_images: set.num_images,
            num_ratings,
            set_index: set.set_index,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskScheduler {
    config: AssignmentConfig,
}

impl TaskScheduler {
    pub fn new(config: AssignmentConfig) -> Self {
        Self { config }
    }

    /// Next batch for `doctor_id`; `count` and `policy` fall back to config
    pub async fn next_assignment(
        &self,
        conn: &mut SqliteConnection,
        doctor_id: Uuid,
        count: Option<usize>,
        policy: Option<AssignmentPolicy>,
    ) -> Result<Vec<Assignment>> {
        if !doctors::exists(conn, doctor_id).await? {
            return Err(AuthError::UserNotFound(doctor_id.to_string()).into());
        }

        let count = count.unwrap_or(self.config.batch_size);
        let policy = policy.unwrap_or(self.config.default_policy);

        let sets = image_sets::list_image_sets(conn).await?;
        let ratings = evaluations::rating_counts(conn).await?;
        let candidates: Vec<Assignment> = sets
            .iter()
            .map(|set| {
                let num_ratings = ratings.get(&set.image_set_id).copied().unwrap_or(0);
                Assignment::from_set(set, num_ratings)
            })
            .collect();

        let batch = match policy {
            AssignmentPolicy::Random => sample_random(&candidates, count),
            AssignmentPolicy::LeastChosen => {
                let evaluated: HashSet<String> = evaluations::evaluated_set_ids(conn, doctor_id)
                    .await?
                    .into_iter()
                    .collect();
                let set_evaluations = evaluations::all_set_evaluations(conn).await?;
                let mut excluded =
                    truly_excluded(&set_evaluations, self.config.exclusion_min_agreement);
                excluded.extend(evaluated);
                if self.config.skip_conflicted {
                    excluded.extend(
                        sets.iter()
                            .filter(|s| s.conflicted)
                            .map(|s| s.image_set_id.clone()),
                    );
                }

                select_least_chosen(candidates, &excluded, count)
            }
        };

        tracing::info!(
            doctor_id = %doctor_id,
            policy = ?policy,
            requested = count,
            assigned = batch.len(),
            "Assignment batch selected"
        );

        Ok(batch)
    }
}

/// Sets whose subject-level verdicts agree they are irrelevant or low quality
///
/// A set qualifies once it has at least `min_agreement` verdicts and every one
/// of them carries the same flag.
pub fn truly_excluded(
    set_evaluations: &[ImageSetEvaluation],
    min_agreement: usize,
) -> HashSet<String> {
    let mut by_set: HashMap<&str, Vec<&ImageSetEvaluation>> = HashMap::new();
    for evaluation in set_evaluations {
        by_set
            .entry(evaluation.image_set_id.as_str())
            .or_default()
            .push(evaluation);
    }

    by_set
        .into_iter()
        .filter(|(_, verdicts)| {
            verdicts.len() >= min_agreement.max(1)
                && (verdicts.iter().all(|e| e.is_irrelevant)
                    || verdicts.iter().all(|e| e.is_low_quality))
        })
        .map(|(set_id, _)| set_id.to_string())
        .collect()
}

/// Stable sort by rating count, one set per patient, first `count`
pub fn select_least_chosen(
    mut candidates: Vec<Assignment>,
    excluded: &HashSet<String>,
    count: usize,
) -> Vec<Assignment> {
    candidates.retain(|c| !excluded.contains(&c.image_set_id));
    candidates.sort_by_key(|c| (c.num_ratings, c.set_index));

    let mut seen_patients = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| match &c.patient_id {
            Some(patient) => seen_patients.insert(patient.clone()),
            None => true,
        })
        .take(count)
        .collect()
}

fn sample_random(candidates: &[Assignment], count: usize) -> Vec<Assignment> {
    let mut rng = rand::thread_rng();
    candidates
        .choose_multiple(&mut rng, count)
        .cloned()
        .collect()
}
