use super::Error;

/// Error when an operation would leave a mandatory one-to-one reference
/// without a target.
#[derive(Debug)]
pub(super) struct RelationRequired {
    model: Box<str>,
    field: Box<str>,
}

impl std::error::Error for RelationRequired {}

impl core::fmt::Display for RelationRequired {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "model {}: the relation `{}` is required and cannot be cleared",
            self.model, self.field
        )
    }
}

impl Error {
    /// Creates an error for a mandatory relation that would be cleared.
    pub fn relation_required(model: impl Into<String>, field: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::RelationRequired(RelationRequired {
            model: model.into().into(),
            field: field.into().into(),
        }))
    }

    /// Returns `true` if this error is a required relation error.
    pub fn is_relation_required(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::RelationRequired(_))
    }
}
