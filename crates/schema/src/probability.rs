use crate::taxonomy::TAXONOMY_SIZE;

/// Allowed drift of the probability sum away from 1.0.
pub const PROBABILITY_SUM_TOLERANCE: f32 = 0.01;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProbabilityError {
    #[error("expected {expected} scores, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("score at index {index} is not finite")]
    NonFinite { index: usize },

    #[error("score {value} at index {index} is outside [0, 1]")]
    OutOfRange { index: usize, value: f32 },

    #[error("scores sum to {sum}, expected 1 +/- 0.01")]
    Sum { sum: f32 },
}

/// Engine output, one score per taxonomy entry.
///
/// The length is fixed by the type; a vector of any other length cannot be
/// constructed, so nothing downstream truncates or pads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbabilityVector([f32; TAXONOMY_SIZE]);

impl ProbabilityVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<f32> {
        self.0.get(index).copied()
    }
}

impl TryFrom<&[f32]> for ProbabilityVector {
    type Error = ProbabilityError;

    fn try_from(scores: &[f32]) -> Result<Self, Self::Error> {
        let values: [f32; TAXONOMY_SIZE] =
            scores.try_into().map_err(|_| ProbabilityError::Length {
                expected: TAXONOMY_SIZE,
                actual: scores.len(),
            })?;

        for (index, &value) in values.iter().enumerate() {
            if !value.is_finite() {
                return Err(ProbabilityError::NonFinite { index });
            }
            if !(0.0..=1.0).contains(&value) {
                return Err(ProbabilityError::OutOfRange { index, value });
            }
        }

        let sum: f32 = values.iter().sum();
        if (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
            return Err(ProbabilityError::Sum { sum });
        }

        Ok(Self(values))
    }
}

impl TryFrom<Vec<f32>> for ProbabilityVector {
    type Error = ProbabilityError;

    fn try_from(scores: Vec<f32>) -> Result<Self, Self::Error> {
        Self::try_from(scores.as_slice())
    }
}
