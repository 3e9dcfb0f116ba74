pub mod diagnosis;
pub mod frame;
pub mod probability;
pub mod taxonomy;
pub mod tensor;

pub use diagnosis::{DiagnosisResult, DiseaseRecord, Prediction, SeverityLevel, SourceMode};
pub use frame::{PixelFormat, RawFrame};
pub use probability::{PROBABILITY_SUM_TOLERANCE, ProbabilityError, ProbabilityVector};
pub use taxonomy::{ClassIdentity, TAXONOMY, TAXONOMY_SIZE, TaxonomyEntry};
pub use tensor::{INPUT_CHANNELS, INPUT_HEIGHT, INPUT_WIDTH, TENSOR_SHAPE, TensorBuffer, TensorShapeError};
