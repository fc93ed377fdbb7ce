//! Consensus slice labels for the training pipeline

use std::collections::BTreeMap;

use medfabric_common::db::models::Region;
use medfabric_common::{ImageSetError, Result};
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::db::evaluations::{self, RegionTag};
use crate::db::image_sets;
use crate::services::reconcile::{reconcile, ReconcileStrategy};

/// Lowest tagged slice per reviewer session
pub fn choices_per_session(tags: &[RegionTag]) -> Vec<i64> {
    let mut lowest: BTreeMap<(Uuid, Uuid), i64> = BTreeMap::new();
    for tag in tags {
        lowest
            .entry((tag.doctor_id, tag.session_id))
            .and_modify(|slice| *slice = (*slice).min(tag.slice_index))
            .or_insert(tag.slice_index);
    }
    lowest.into_values().collect()
}

/// Consensus slice index for `region` in a set, `None` if nobody tagged it
pub async fn consensus_slice(
    conn: &mut SqliteConnection,
    image_set_id: &str,
    region: Region,
    strategy: ReconcileStrategy,
) -> Result<Option<i64>> {
    if !image_sets::exists(conn, image_set_id).await? {
        return Err(ImageSetError::NotFound(image_set_id.to_string()).into());
    }

    let tags = evaluations::region_tags(conn, image_set_id, region).await?;
    let choices = choices_per_session(&tags);
    if choices.is_empty() {
        return Ok(None);
    }

    let value = reconcile(&choices, strategy)?;
    tracing::debug!(image_set_id, %region, %strategy, reviewers = choices.len(), value, "Consensus slice");
    Ok(Some(value))
}
