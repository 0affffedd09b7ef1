//! Score → zone → label → color mapping shared by gauges, tables and filters.

use crate::domain::models::Score;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Zone {
    Detractor,
    Passive,
    Promoter,
}

impl Zone {
    pub fn label(&self) -> &'static str {
        match self {
            Zone::Detractor => "Detractors",
            Zone::Passive => "Passives",
            Zone::Promoter => "Promoters",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Zone::Detractor => "#DC2626",
            Zone::Passive => "#F59E0B",
            Zone::Promoter => "#059669",
        }
    }
}

/// 0-6 detractor, 7-8 passive, 9-10 promoter.
pub fn classify_score(score: Score) -> Zone {
    match score.value() {
        0..=6 => Zone::Detractor,
        7 | 8 => Zone::Passive,
        _ => Zone::Promoter,
    }
}

/// Finer-grained wording shown next to an individual answer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SatisfactionLevel {
    VeryDissatisfied,
    Dissatisfied,
    Neutral,
    Satisfied,
    VerySatisfied,
}

impl SatisfactionLevel {
    pub fn for_score(score: Score) -> Self {
        match score.value() {
            0..=3 => SatisfactionLevel::VeryDissatisfied,
            4..=6 => SatisfactionLevel::Dissatisfied,
            7 => SatisfactionLevel::Neutral,
            8 => SatisfactionLevel::Satisfied,
            _ => SatisfactionLevel::VerySatisfied,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SatisfactionLevel::VeryDissatisfied => "Very dissatisfied",
            SatisfactionLevel::Dissatisfied => "Dissatisfied",
            SatisfactionLevel::Neutral => "Neutral",
            SatisfactionLevel::Satisfied => "Satisfied",
            SatisfactionLevel::VerySatisfied => "Very satisfied",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            SatisfactionLevel::VeryDissatisfied => "#DC2626",
            SatisfactionLevel::Dissatisfied => "#EF4444",
            SatisfactionLevel::Neutral | SatisfactionLevel::Satisfied => "#F59E0B",
            SatisfactionLevel::VerySatisfied => "#059669",
        }
    }

    pub fn zone(&self) -> Zone {
        match self {
            SatisfactionLevel::VeryDissatisfied | SatisfactionLevel::Dissatisfied => {
                Zone::Detractor
            }
            SatisfactionLevel::Neutral | SatisfactionLevel::Satisfied => Zone::Passive,
            SatisfactionLevel::VerySatisfied => Zone::Promoter,
        }
    }
}

/// Coarse label for an aggregate NPS value, not for individual answers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClassificationBand {
    Critical,
    Regular,
    Excellent,
}

impl ClassificationBand {
    pub fn label(&self) -> &'static str {
        match self {
            ClassificationBand::Critical => "CRITICAL",
            ClassificationBand::Regular => "REGULAR",
            ClassificationBand::Excellent => "EXCELLENT",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            ClassificationBand::Critical => "#EF4444",
            ClassificationBand::Regular => "#EAB308",
            ClassificationBand::Excellent => "#22C55E",
        }
    }
}

pub fn classification_band(nps_score: i32) -> ClassificationBand {
    if nps_score < 0 {
        ClassificationBand::Critical
    } else if nps_score < 50 {
        ClassificationBand::Regular
    } else {
        ClassificationBand::Excellent
    }
}
