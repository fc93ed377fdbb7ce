//! Database models
//!
//! Closed enumerations are stored as TEXT using their variant names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::Error;

/// Anatomical region selected by a reviewer for one slice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    None,
    BasalCentral,
    BasalCortex,
    CoronaRadiata,
}

impl Region {
    pub const ALL: [Region; 4] = [
        Region::None,
        Region::BasalCentral,
        Region::BasalCortex,
        Region::CoronaRadiata,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::None => "None",
            Region::BasalCentral => "BasalCentral",
            Region::BasalCortex => "BasalCortex",
            Region::CoronaRadiata => "CoronaRadiata",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Region {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Region::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown region: {}", s)))
    }
}

/// Kind of disagreement recorded by the conflict scanner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConflictType {
    Classification,
    Score,
    Quality,
    IrrelevantData,
}

impl ConflictType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictType::Classification => "Classification",
            ConflictType::Score => "Score",
            ConflictType::Quality => "Quality",
            ConflictType::IrrelevantData => "IrrelevantData",
        }
    }
}

impl FromStr for ConflictType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Classification" => Ok(ConflictType::Classification),
            "Score" => Ok(ConflictType::Score),
            "Quality" => Ok(ConflictType::Quality),
            "IrrelevantData" => Ok(ConflictType::IrrelevantData),
            other => Err(Error::Internal(format!("Unknown conflict type: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Labeler,
    Verifier,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Labeler => "labeler",
            Role::Verifier => "verifier",
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "labeler" => Ok(Role::Labeler),
            "verifier" => Ok(Role::Verifier),
            other => Err(Error::InvalidInput(format!("Unknown role: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

impl FromStr for Gender {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Male" => Ok(Gender::Male),
            "Female" => Ok(Gender::Female),
            "Other" => Ok(Gender::Other),
            other => Err(Error::InvalidInput(format!("Unknown gender: {}", other))),
        }
    }
}

/// One of the six bounded sub-scores of an image evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreField {
    BasalCentralLeft,
    BasalCentralRight,
    BasalCortexLeft,
    BasalCortexRight,
    CoronaLeft,
    CoronaRight,
}

impl ScoreField {
    pub const ALL: [ScoreField; 6] = [
        ScoreField::BasalCentralLeft,
        ScoreField::BasalCentralRight,
        ScoreField::BasalCortexLeft,
        ScoreField::BasalCortexRight,
        ScoreField::CoronaLeft,
        ScoreField::CoronaRight,
    ];

    /// Column name in `image_evaluations`
    pub fn column(&self) -> &'static str {
        match self {
            ScoreField::BasalCentralLeft => "basal_score_central_left",
            ScoreField::BasalCentralRight => "basal_score_central_right",
            ScoreField::BasalCortexLeft => "basal_score_cortex_left",
            ScoreField::BasalCortexRight => "basal_score_cortex_right",
            ScoreField::CoronaLeft => "corona_score_left",
            ScoreField::CoronaRight => "corona_score_right",
        }
    }
}

/// The six optional sub-scores of an image evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ScoreSet {
    #[serde(default)]
    pub basal_central_left: Option<i64>,
    #[serde(default)]
    pub basal_central_right: Option<i64>,
    #[serde(default)]
    pub basal_cortex_left: Option<i64>,
    #[serde(default)]
    pub basal_cortex_right: Option<i64>,
    #[serde(default)]
    pub corona_left: Option<i64>,
    #[serde(default)]
    pub corona_right: Option<i64>,
}

impl ScoreSet {
    pub fn get(&self, field: ScoreField) -> Option<i64> {
        match field {
            ScoreField::BasalCentralLeft => self.basal_central_left,
            ScoreField::BasalCentralRight => self.basal_central_right,
            ScoreField::BasalCortexLeft => self.basal_cortex_left,
            ScoreField::BasalCortexRight => self.basal_cortex_right,
            ScoreField::CoronaLeft => self.corona_left,
            ScoreField::CoronaRight => self.corona_right,
        }
    }

    pub fn set(&mut self, field: ScoreField, value: Option<i64>) {
        match field {
            ScoreField::BasalCentralLeft => self.basal_central_left = value,
            ScoreField::BasalCentralRight => self.basal_central_right = value,
            ScoreField::BasalCortexLeft => self.basal_cortex_left = value,
            ScoreField::BasalCortexRight => self.basal_cortex_right = value,
            ScoreField::CoronaLeft => self.corona_left = value,
            ScoreField::CoronaRight => self.corona_right = value,
        }
    }

    /// Builder-style setter, mostly for tests and ingestion
    pub fn with(mut self, field: ScoreField, value: i64) -> Self {
        self.set(field, Some(value));
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Doctor {
    pub doctor_id: Uuid,
    pub username: String,
    pub role: Role,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub password_salt: String,
    pub created_at: DateTime<Utc>,
}

/// Login session; deactivated on logout, never deleted
#[derive(Debug, Clone, Serialize)]
pub struct SessionRecord {
    pub session_id: Uuid,
    pub doctor_id: Uuid,
    pub login_time: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Patient {
    pub patient_id: String,
    pub category: Option<String>,
    pub age: Option<i64>,
    pub gender: Option<Gender>,
}

/// A named collection of ordered slices (one scan)
#[derive(Debug, Clone, Serialize)]
pub struct ImageSet {
    /// Insertion order, used as a stable tie-breaker
    pub set_index: i64,
    pub image_set_id: String,
    pub patient_id: Option<String>,
    pub num_images: i64,
    pub folder_path: Option<String>,
    pub conflicted: bool,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Image {
    pub image_id: String,
    pub image_set_id: String,
    pub slice_index: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageEvaluation {
    pub id: i64,
    pub doctor_id: Uuid,
    pub image_id: String,
    pub session_id: Uuid,
    pub region: Region,
    pub scores: ScoreSet,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageSetEvaluation {
    pub id: i64,
    pub doctor_id: Uuid,
    pub image_set_id: String,
    pub session_id: Uuid,
    pub is_low_quality: bool,
    pub is_irrelevant: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conflict {
    pub conflict_id: i64,
    pub image_set_id: String,
    /// `None` for subject-level conflicts
    pub image_id: Option<String>,
    pub conflict_type: ConflictType,
    pub resolved: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_round_trips_through_text() {
        for region in Region::ALL {
            assert_eq!(region.as_str().parse::<Region>().unwrap(), region);
        }
        assert!("Thalamus".parse::<Region>().is_err());
    }

    #[test]
    fn test_score_set_accessors_cover_every_field() {
        let mut scores = ScoreSet::default();
        for (i, field) in ScoreField::ALL.into_iter().enumerate() {
            scores.set(field, Some(i as i64));
        }
        for (i, field) in ScoreField::ALL.into_iter().enumerate() {
            assert_eq!(scores.get(field), Some(i as i64));
        }
    }

    #[test]
    fn test_doctor_serialization_hides_secret() {
        let doctor = Doctor {
            doctor_id: Uuid::new_v4(),
            username: "house".to_string(),
            role: Role::Verifier,
            password_hash: "digest".to_string(),
            password_salt: "salt".to_string(),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&doctor).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "verifier");
    }
}
