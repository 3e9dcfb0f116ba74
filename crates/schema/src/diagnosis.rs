use crate::taxonomy::ClassIdentity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Top class picked from a probability vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub class: ClassIdentity,
    pub class_index: usize,
    pub label: String,
    pub confidence: f32,
}

impl Prediction {
    pub fn new(class: ClassIdentity, confidence: f32) -> Self {
        Self {
            class,
            class_index: class.index(),
            label: class.label().to_string(),
            confidence,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.class.is_healthy()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    Live,
    Captured,
}

/// Descriptive knowledge about a disease class, fetched from the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiseaseRecord {
    pub description: String,
    pub treatment: String,
    pub symptoms: String,
}

/// Outcome of one analysis call.
///
/// Healthy predictions never carry a severity, a disease or a record; the
/// constructor enforces that regardless of what the caller passes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosisResult {
    pub prediction: Prediction,
    pub severity: Option<SeverityLevel>,
    pub diseases: Vec<String>,
    pub disease_record: Option<DiseaseRecord>,
    pub source_mode: SourceMode,
    pub timestamp: DateTime<Utc>,
}

impl DiagnosisResult {
    pub fn new(
        prediction: Prediction,
        severity: Option<SeverityLevel>,
        disease_record: Option<DiseaseRecord>,
        source_mode: SourceMode,
    ) -> Self {
        let healthy = prediction.is_healthy();
        let diseases = if healthy {
            Vec::new()
        } else {
            vec![prediction.label.clone()]
        };

        Self {
            severity: severity.filter(|_| !healthy),
            disease_record: disease_record.filter(|_| !healthy),
            diseases,
            prediction,
            source_mode,
            timestamp: Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.prediction.is_healthy()
    }

    pub fn is_enriched(&self) -> bool {
        self.disease_record.is_some()
    }

    /// Symptom text from the record, or the taxonomy default when enrichment
    /// did not produce one.
    pub fn symptoms(&self) -> &str {
        self.disease_record
            .as_ref()
            .map(|record| record.symptoms.as_str())
            .unwrap_or_else(|| self.prediction.class.default_symptoms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DiseaseRecord {
        DiseaseRecord {
            description: "Fungal disease".to_string(),
            treatment: "Remove infected leaves".to_string(),
            symptoms: "Dark lesions".to_string(),
        }
    }

    #[test]
    fn disease_result_lists_the_disease() {
        let prediction = Prediction::new(ClassIdentity::AppleBlackRot, 0.85);
        let result = DiagnosisResult::new(
            prediction,
            Some(SeverityLevel::High),
            Some(record()),
            SourceMode::Captured,
        );

        assert_eq!(result.diseases, vec!["Apple Black Rot".to_string()]);
        assert_eq!(result.severity, Some(SeverityLevel::High));
        assert_eq!(result.symptoms(), "Dark lesions");
        assert!(result.is_enriched());
    }

    #[test]
    fn healthy_result_strips_severity_and_record() {
        let prediction = Prediction::new(ClassIdentity::Healthy, 0.85);
        let result = DiagnosisResult::new(
            prediction,
            Some(SeverityLevel::High),
            Some(record()),
            SourceMode::Live,
        );

        assert!(result.is_healthy());
        assert!(result.diseases.is_empty());
        assert_eq!(result.severity, None);
        assert_eq!(result.disease_record, None);
    }

    #[test]
    fn symptoms_fall_back_to_taxonomy_default() {
        let prediction = Prediction::new(ClassIdentity::CedarAppleRust, 0.5);
        let result = DiagnosisResult::new(prediction, None, None, SourceMode::Live);

        assert_eq!(
            result.symptoms(),
            ClassIdentity::CedarAppleRust.default_symptoms()
        );
    }

    #[test]
    fn serializes_with_lowercase_enums() {
        let prediction = Prediction::new(ClassIdentity::AppleScab, 0.8);
        let result = DiagnosisResult::new(
            prediction,
            Some(SeverityLevel::High),
            None,
            SourceMode::Captured,
        );
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["severity"], "high");
        assert_eq!(json["source_mode"], "captured");
        assert_eq!(json["prediction"]["class"], "apple_scab");
        assert_eq!(json["prediction"]["label"], "Apple Scab");
        assert!(json["disease_record"].is_null());
    }
}
