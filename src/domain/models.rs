use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const MAX_COMMENT_CHARS: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("score {0} is outside 0..=10")]
    ScoreOutOfRange(i64),
    #[error("age must be a positive integer, got {0}")]
    InvalidAge(i32),
    #[error("comment exceeds {max} characters")]
    CommentTooLong { max: usize },
    #[error("unknown gender '{0}'")]
    UnknownGender(String),
}

/// A single 0-10 answer to "how likely are you to recommend us".
///
/// Construction is the only place the range is checked; everything downstream
/// (classification, NPS arithmetic) relies on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Score(u8);

impl Score {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 10;

    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if (Self::MIN as i64..=Self::MAX as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ValidationError::ScoreOutOfRange(value))
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Score {
    type Error = ValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Score::new(value)
    }
}

impl TryFrom<i16> for Score {
    type Error = ValidationError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        Score::new(value as i64)
    }
}

impl From<Score> for i64 {
    fn from(score: Score) -> Self {
        score.0 as i64
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "evaluation_gender", rename_all = "lowercase")]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Gender {
    Male,
    Female,
    Other,
    Undisclosed,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
            Gender::Other => "other",
            Gender::Undisclosed => "undisclosed",
        }
    }
}

impl TryFrom<&str> for Gender {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "male" => Ok(Gender::Male),
            "female" => Ok(Gender::Female),
            "other" => Ok(Gender::Other),
            "undisclosed" | "prefer-not-to-say" => Ok(Gender::Undisclosed),
            other => Err(ValidationError::UnknownGender(other.to_string())),
        }
    }
}

impl TryFrom<String> for Gender {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Gender::try_from(value.as_str())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Operator,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Evaluation {
    pub id: Uuid,
    pub company_id: Uuid,
    #[sqlx(try_from = "i16")]
    pub score: Score,
    pub gender: Gender,
    pub age: i32,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Form data submitted by the evaluation flow, before an id and timestamp exist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationDraft {
    pub company_id: Uuid,
    pub score: Score,
    pub gender: Gender,
    pub age: i32,
    #[serde(default)]
    pub comment: Option<String>,
}

impl EvaluationDraft {
    /// Checks the fields serde cannot express and normalizes blank comments to `None`.
    pub fn validated(mut self) -> Result<Self, ValidationError> {
        if self.age <= 0 {
            return Err(ValidationError::InvalidAge(self.age));
        }
        self.comment = self
            .comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        if let Some(comment) = &self.comment {
            if comment.chars().count() > MAX_COMMENT_CHARS {
                return Err(ValidationError::CommentTooLong {
                    max: MAX_COMMENT_CHARS,
                });
            }
        }
        Ok(self)
    }

    pub fn into_evaluation(self, created_at: DateTime<Utc>) -> Evaluation {
        Evaluation {
            id: Uuid::new_v4(),
            company_id: self.company_id,
            score: self.score,
            gender: self.gender,
            age: self.age,
            comment: self.comment,
            created_at,
        }
    }
}

/// Optional narrowing predicates; absent fields impose no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationFilters {
    pub company_id: Option<Uuid>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub min_score: Option<u8>,
    pub max_score: Option<u8>,
    pub gender: Option<Gender>,
    pub age_from: Option<i32>,
    pub age_to: Option<i32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpsBreakdown {
    pub promoters: u32,
    pub passives: u32,
    pub detractors: u32,
    pub total_evaluations: u32,
    pub nps_score: i32,
}
