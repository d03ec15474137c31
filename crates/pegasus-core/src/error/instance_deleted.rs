use super::Error;

/// Error when a write targets an instance that was already deleted.
#[derive(Debug)]
pub(super) struct InstanceDeleted {
    model: Box<str>,
}

impl std::error::Error for InstanceDeleted {}

impl core::fmt::Display for InstanceDeleted {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "model {}: the instance was deleted", self.model)
    }
}

impl Error {
    /// Creates an error for an operation on a deleted instance.
    pub fn instance_deleted(model: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::InstanceDeleted(InstanceDeleted {
            model: model.into().into(),
        }))
    }

    /// Returns `true` if this error is an instance-deleted error.
    pub fn is_instance_deleted(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::InstanceDeleted(_))
    }
}
