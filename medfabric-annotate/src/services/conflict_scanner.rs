//! Conflict scanner
//!
//! A scan recomputes the full set of disagreements from the evaluation
//! tables, diffs it against the stored conflict rows and then recomputes
//! each image set's `conflicted` flag. The caller runs it inside a single
//! transaction under the write gate; a second scan over unchanged data
//! touches nothing.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use medfabric_common::db::models::{Conflict, ConflictType, ImageSetEvaluation, Region};
use medfabric_common::Result;
use serde::Serialize;
use sqlx::SqliteConnection;

use crate::db::evaluations::SetScopedEvaluation;
use crate::db::{conflicts, evaluations, image_sets};
use crate::services::validator::relevant_fields;

/// Identity of a conflict row: (image set, image or subject level, type)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConflictKey {
    pub image_set_id: String,
    pub image_id: Option<String>,
    pub conflict_type: ConflictType,
}

impl From<&Conflict> for ConflictKey {
    fn from(conflict: &Conflict) -> Self {
        Self {
            image_set_id: conflict.image_set_id.clone(),
            image_id: conflict.image_id.clone(),
            conflict_type: conflict.conflict_type,
        }
    }
}

/// Mutations applied by one scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub inserted: usize,
    pub reopened: usize,
    pub resolved: usize,
    pub flags_changed: usize,
}

impl ScanReport {
    pub fn is_noop(&self) -> bool {
        *self == ScanReport::default()
    }
}

/// Disagreements currently present in the evaluations
pub fn detect_conflicts(
    image_evaluations: &[SetScopedEvaluation],
    set_evaluations: &[ImageSetEvaluation],
) -> BTreeSet<ConflictKey> {
    let mut detected = BTreeSet::new();

    let mut by_image: BTreeMap<(&str, &str), Vec<&SetScopedEvaluation>> = BTreeMap::new();
    for scoped in image_evaluations {
        by_image
            .entry((scoped.image_set_id.as_str(), scoped.evaluation.image_id.as_str()))
            .or_default()
            .push(scoped);
    }

    for ((set_id, image_id), group) in by_image {
        if group.len() < 2 {
            continue;
        }

        let regions: BTreeSet<Region> = group.iter().map(|s| s.evaluation.region).collect();
        let conflict_type = if regions.len() > 1 {
            Some(ConflictType::Classification)
        } else {
            let region = group[0].evaluation.region;
            let disagrees = relevant_fields(region).iter().any(|field| {
                let values: BTreeSet<Option<i64>> =
                    group.iter().map(|s| s.evaluation.scores.get(*field)).collect();
                values.len() > 1
            });
            disagrees.then_some(ConflictType::Score)
        };

        if let Some(conflict_type) = conflict_type {
            tracing::debug!(image_set_id = set_id, image_id, ?conflict_type, "Image disagreement");
            detected.insert(ConflictKey {
                image_set_id: set_id.to_string(),
                image_id: Some(image_id.to_string()),
                conflict_type,
            });
        }
    }

    let mut by_set: BTreeMap<&str, Vec<&ImageSetEvaluation>> = BTreeMap::new();
    for evaluation in set_evaluations {
        by_set
            .entry(evaluation.image_set_id.as_str())
            .or_default()
            .push(evaluation);
    }

    for (set_id, group) in by_set {
        if group.len() < 2 {
            continue;
        }
        let quality: HashSet<bool> = group.iter().map(|e| e.is_low_quality).collect();
        let relevance: HashSet<bool> = group.iter().map(|e| e.is_irrelevant).collect();
        if quality.len() > 1 || relevance.len() > 1 {
            tracing::debug!(image_set_id = set_id, "Subject-level disagreement");
            detected.insert(ConflictKey {
                image_set_id: set_id.to_string(),
                image_id: None,
                conflict_type: ConflictType::Classification,
            });
        }
    }

    detected
}

/// Detect, diff and propagate on the given connection
///
/// Must run inside the caller's transaction; nothing here commits.
pub async fn run_scan(conn: &mut SqliteConnection) -> Result<ScanReport> {
    let image_evaluations = evaluations::all_image_evaluations(conn).await?;
    let set_evaluations = evaluations::all_set_evaluations(conn).await?;
    let detected = detect_conflicts(&image_evaluations, &set_evaluations);

    let mut report = ScanReport::default();
    let mut known = HashSet::new();

    for existing in conflicts::all_conflicts(conn).await? {
        let key = ConflictKey::from(&existing);
        let still_present = detected.contains(&key);
        if still_present && existing.resolved {
            conflicts::set_resolved(conn, existing.conflict_id, false).await?;
            report.reopened += 1;
        } else if !still_present && !existing.resolved {
            conflicts::set_resolved(conn, existing.conflict_id, true).await?;
            report.resolved += 1;
        }
        known.insert(key);
    }

    for key in detected.iter().filter(|k| !known.contains(*k)) {
        conflicts::insert_conflict(conn, &key.image_set_id, key.image_id.as_deref(), key.conflict_type)
            .await?;
        report.inserted += 1;
    }

    let unresolved: HashSet<String> = conflicts::unresolved_set_ids(conn).await?.into_iter().collect();
    for set in image_sets::list_image_sets(conn).await? {
        let conflicted = unresolved.contains(&set.image_set_id);
        if set.conflicted != conflicted {
            image_sets::set_conflicted(conn, &set.image_set_id, conflicted).await?;
            report.flags_changed += 1;
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use medfabric_common::db::models::{ImageEvaluation, ScoreField, ScoreSet};
    use uuid::Uuid;

    fn image_eval(set: &str, image: &str, region: Region, scores: ScoreSet) -> SetScopedEvaluation {
        SetScopedEvaluation {
            image_set_id: set.to_string(),
            evaluation: ImageEvaluation {
                id: 0,
                doctor_id: Uuid::new_v4(),
                image_id: image.to_string(),
                session_id: Uuid::new_v4(),
                region,
                scores,
                notes: None,
            },
        }
    }

    fn corona(left: i64, right: i64) -> ScoreSet {
        ScoreSet::default()
            .with(ScoreField::CoronaLeft, left)
            .with(ScoreField::CoronaRight, right)
    }

    fn verdict(set: &str, low_quality: bool, irrelevant: bool) -> ImageSetEvaluation {
        ImageSetEvaluation {
            id: 0,
            doctor_id: Uuid::new_v4(),
            image_set_id: set.to_string(),
            session_id: Uuid::new_v4(),
            is_low_quality: low_quality,
            is_irrelevant: irrelevant,
        }
    }

    #[test]
    fn test_single_evaluation_never_conflicts() {
        let evals = vec![image_eval("s", "i", Region::CoronaRadiata, corona(1, 1))];
        assert!(detect_conflicts(&evals, &[]).is_empty());
    }

    #[test]
    fn test_region_disagreement_is_classification() {
        let evals = vec![
            image_eval("s", "i", Region::CoronaRadiata, corona(1, 1)),
            image_eval("s", "i", Region::None, ScoreSet::default()),
        ];
        let detected = detect_conflicts(&evals, &[]);
        assert_eq!(detected.len(), 1);
        let key = detected.iter().next().unwrap();
        assert_eq!(key.conflict_type, ConflictType::Classification);
        assert_eq!(key.image_id.as_deref(), Some("i"));
    }

    #[test]
    fn test_score_disagreement_on_shared_region() {
        let evals = vec![
            image_eval("s", "i", Region::CoronaRadiata, corona(1, 2)),
            image_eval("s", "i", Region::CoronaRadiata, corona(1, 3)),
            image_eval("s", "j", Region::CoronaRadiata, corona(2, 2)),
            image_eval("s", "j", Region::CoronaRadiata, corona(2, 2)),
        ];
        let detected = detect_conflicts(&evals, &[]);
        assert_eq!(detected.len(), 1);
        let key = detected.iter().next().unwrap();
        assert_eq!(key.conflict_type, ConflictType::Score);
        assert_eq!(key.image_id.as_deref(), Some("i"));
    }

    #[test]
    fn test_agreeing_none_region_is_clean() {
        let evals = vec![
            image_eval("s", "i", Region::None, ScoreSet::default()),
            image_eval("s", "i", Region::None, ScoreSet::default()),
        ];
        assert!(detect_conflicts(&evals, &[]).is_empty());
    }

    #[test]
    fn test_subject_level_flag_disagreement() {
        let verdicts = vec![
            verdict("s", true, false),
            verdict("s", false, true),
            verdict("t", true, true),
            verdict("t", true, true),
        ];
        let detected = detect_conflicts(&[], &verdicts);
        assert_eq!(detected.len(), 1);
        let key = detected.iter().next().unwrap();
        assert_eq!(key.image_set_id, "s");
        assert_eq!(key.image_id, None);
        assert_eq!(key.conflict_type, ConflictType::Classification);
    }
}
