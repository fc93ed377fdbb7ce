//! Score/region validation
//!
//! Each region owns a fixed pair of field sets: fields that must be present
//! and fields that must be absent. Bounds come from [`CriterionConfig`] and
//! are checked independently of the region rule; both must pass.

use medfabric_common::config::CriterionConfig;
use medfabric_common::db::models::{Region, ScoreField, ScoreSet};
use medfabric_common::EvaluationError;

use ScoreField::*;

/// Required/forbidden score fields for one region
#[derive(Debug, Clone, Copy)]
pub struct RegionRule {
    pub required: &'static [ScoreField],
    pub forbidden: &'static [ScoreField],
}

const BASAL: [ScoreField; 4] = [
    BasalCentralLeft,
    BasalCentralRight,
    BasalCortexLeft,
    BasalCortexRight,
];

/// Lookup table from region to its rule
pub fn rule_for(region: Region) -> RegionRule {
    match region {
        Region::None => RegionRule {
            required: &[],
            forbidden: &ScoreField::ALL,
        },
        Region::BasalCentral => RegionRule {
            required: &[BasalCentralLeft, BasalCentralRight],
            forbidden: &[CoronaLeft, CoronaRight],
        },
        Region::BasalCortex => RegionRule {
            required: &[BasalCortexLeft, BasalCortexRight],
            forbidden: &[CoronaLeft, CoronaRight],
        },
        Region::CoronaRadiata => RegionRule {
            required: &[CoronaLeft, CoronaRight],
            forbidden: &BASAL,
        },
    }
}

/// Fields that carry meaning for a region; used when comparing reviewers
pub fn relevant_fields(region: Region) -> &'static [ScoreField] {
    match region {
        Region::None => &[],
        Region::BasalCentral | Region::BasalCortex => &BASAL,
        Region::CoronaRadiata => &[CoronaLeft, CoronaRight],
    }
}

/// Validates score sets against the region table and configured ceilings
#[derive(Debug, Clone)]
pub struct ScoreValidator {
    criterion: CriterionConfig,
}

impl ScoreValidator {
    pub fn new(criterion: CriterionConfig) -> Self {
        Self { criterion }
    }

    /// Inclusive ceiling for a field
    pub fn max_for(&self, field: ScoreField) -> i64 {
        match field {
            BasalCentralLeft | BasalCentralRight => self.criterion.basal_central_max,
            BasalCortexLeft | BasalCortexRight => self.criterion.basal_cortex_max,
            CoronaLeft | CoronaRight => self.criterion.corona_max,
        }
    }

    pub fn validate(&self, region: Region, scores: &ScoreSet) -> Result<(), EvaluationError> {
        self.check_region(region, scores)?;
        self.check_bounds(scores)
    }

    fn check_region(&self, region: Region, scores: &ScoreSet) -> Result<(), EvaluationError> {
        let rule = rule_for(region);

        if let Some(field) = rule.required.iter().find(|f| scores.get(**f).is_none()) {
            return Err(EvaluationError::Invalid(format!(
                "{} is required for region {}",
                field.column(),
                region
            )));
        }

        if let Some(field) = rule.forbidden.iter().find(|f| scores.get(**f).is_some()) {
            return Err(EvaluationError::Invalid(format!(
                "{} must be empty for region {}",
                field.column(),
                region
            )));
        }

        Ok(())
    }

    fn check_bounds(&self, scores: &ScoreSet) -> Result<(), EvaluationError> {
        for field in ScoreField::ALL {
            let Some(value) = scores.get(field) else {
                continue;
            };
            let max = self.max_for(field);
            if !(0..=max).contains(&value) {
                return Err(EvaluationError::Invalid(format!(
                    "{} = {} is outside [0, {}]",
                    field.column(),
                    value,
                    max
                )));
            }
        }
        Ok(())
    }
}

impl Default for ScoreValidator {
    fn default() -> Self {
        Self::new(CriterionConfig::default())
    }
}
