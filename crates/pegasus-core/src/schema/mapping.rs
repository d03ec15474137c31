mod model;
pub use model::{Field, Model};

use super::app::ModelId;

/// Defines the correspondence between app-level models and db-level
/// tables.
#[derive(Debug, Default)]
pub struct Mapping {
    /// Per-model mappings, indexed by model id
    pub models: Vec<Model>,
}

impl Mapping {
    pub fn model(&self, id: impl Into<ModelId>) -> &Model {
        &self.models[id.into().0]
    }
}
