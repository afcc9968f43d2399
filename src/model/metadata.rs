use serde::{Deserialize, Serialize};

/// Optional annotations attached to a saved model.
/// All fields are Option<> so artifacts without metadata deserialize cleanly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub description: Option<String>,
    /// What the scalar output measures (e.g. "disease").
    pub output_label: Option<String>,
    /// Where the weights came from (dataset, export tool, ...).
    pub source: Option<String>,
}
