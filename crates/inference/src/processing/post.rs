use schema::{ClassIdentity, Prediction, ProbabilityVector, SeverityLevel};

/// Confidence strictly above this is `High`.
pub const HIGH_SEVERITY_THRESHOLD: f32 = 0.7;
/// Confidence strictly above this (and not `High`) is `Medium`.
pub const MEDIUM_SEVERITY_THRESHOLD: f32 = 0.4;

/// Pick the most probable class. Ties go to the lowest index.
#[tracing::instrument(level = "trace", skip_all)]
pub fn classify(probs: &ProbabilityVector) -> Prediction {
    let mut best = ClassIdentity::ALL[0];
    let mut best_score = f32::NEG_INFINITY;

    for (&class, &score) in ClassIdentity::ALL.iter().zip(probs.as_slice()) {
        // Strict comparison keeps the first maximum
        if score > best_score {
            best = class;
            best_score = score;
        }
    }

    Prediction::new(best, best_score)
}

/// Severity from confidence. `None` for healthy predictions.
pub fn severity_for(prediction: &Prediction) -> Option<SeverityLevel> {
    if prediction.is_healthy() {
        return None;
    }

    let level = if prediction.confidence > HIGH_SEVERITY_THRESHOLD {
        SeverityLevel::High
    } else if prediction.confidence > MEDIUM_SEVERITY_THRESHOLD {
        SeverityLevel::Medium
    } else {
        SeverityLevel::Low
    };

    Some(level)
}
