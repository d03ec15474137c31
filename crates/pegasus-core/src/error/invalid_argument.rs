use super::Error;

/// Error when the arguments given to `create`, `get` or a field write do
/// not fit the model.
///
/// These are recoverable: nothing was written to storage when one is
/// returned.
#[derive(Debug)]
pub(super) struct InvalidArgument {
    model: Box<str>,
    field: Box<str>,
    reason: InvalidArgumentReason,
}

/// Why an argument was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidArgumentReason {
    /// A required field without default was not supplied on creation.
    Missing,

    /// A value was supplied for a storage-assigned field on creation.
    Forbidden,

    /// A storage-assigned field was written after creation.
    SetByStorage,

    /// The model has no field with this name.
    UnknownField,
}

impl std::error::Error for InvalidArgument {}

impl core::fmt::Display for InvalidArgument {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let InvalidArgument {
            model,
            field,
            reason,
        } = self;

        match reason {
            InvalidArgumentReason::Missing => {
                write!(f, "model {model}: missing the argument `{field}`")
            }
            InvalidArgumentReason::Forbidden => write!(
                f,
                "model {model}: can't set `{field}`, let the storage engine do it"
            ),
            InvalidArgumentReason::SetByStorage => {
                write!(f, "model {model}: only the storage engine should set `{field}`")
            }
            InvalidArgumentReason::UnknownField => {
                write!(f, "model {model}: no field named `{field}`")
            }
        }
    }
}

impl Error {
    fn invalid_argument(
        model: impl Into<String>,
        field: impl Into<String>,
        reason: InvalidArgumentReason,
    ) -> Error {
        Error::from(super::ErrorKind::InvalidArgument(InvalidArgument {
            model: model.into().into(),
            field: field.into().into(),
            reason,
        }))
    }

    /// Creates an error for a required field missing on creation.
    pub fn missing_argument(model: impl Into<String>, field: impl Into<String>) -> Error {
        Error::invalid_argument(model, field, InvalidArgumentReason::Missing)
    }

    /// Creates an error for a storage-assigned field supplied on creation.
    pub fn forbidden_argument(model: impl Into<String>, field: impl Into<String>) -> Error {
        Error::invalid_argument(model, field, InvalidArgumentReason::Forbidden)
    }

    /// Creates an error for a write to a storage-assigned field.
    pub fn set_by_storage(model: impl Into<String>, field: impl Into<String>) -> Error {
        Error::invalid_argument(model, field, InvalidArgumentReason::SetByStorage)
    }

    /// Creates an error for a field name the model does not declare.
    pub fn unknown_field(model: impl Into<String>, field: impl Into<String>) -> Error {
        Error::invalid_argument(model, field, InvalidArgumentReason::UnknownField)
    }

    /// Returns the reason if this error is an invalid argument error.
    pub fn invalid_argument_reason(&self) -> Option<InvalidArgumentReason> {
        match self.kind() {
            super::ErrorKind::InvalidArgument(err) => Some(err.reason),
            _ => None,
        }
    }

    /// Returns `true` if this error is any kind of invalid argument error.
    pub fn is_invalid_argument(&self) -> bool {
        self.invalid_argument_reason().is_some()
    }

    /// Returns `true` if a required argument was missing.
    pub fn is_missing_argument(&self) -> bool {
        self.invalid_argument_reason() == Some(InvalidArgumentReason::Missing)
    }

    /// Returns `true` if a storage-assigned argument was supplied.
    pub fn is_forbidden_argument(&self) -> bool {
        self.invalid_argument_reason() == Some(InvalidArgumentReason::Forbidden)
    }

    /// Returns `true` if a storage-assigned field was written.
    pub fn is_set_by_storage(&self) -> bool {
        self.invalid_argument_reason() == Some(InvalidArgumentReason::SetByStorage)
    }

    /// Returns `true` if the field name is unknown to the model.
    pub fn is_unknown_field(&self) -> bool {
        self.invalid_argument_reason() == Some(InvalidArgumentReason::UnknownField)
    }
}
