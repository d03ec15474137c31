use super::Error;

/// Error when a transaction is finished out of order.
///
/// Only the innermost active transaction may be committed or rolled back.
#[derive(Debug)]
pub(super) struct InvalidTransaction {
    message: Box<str>,
}

impl std::error::Error for InvalidTransaction {}

impl core::fmt::Display for InvalidTransaction {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "invalid transaction: {}", self.message)
    }
}

impl Error {
    /// Creates an invalid transaction error.
    pub fn invalid_transaction(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::InvalidTransaction(InvalidTransaction {
            message: message.into().into(),
        }))
    }

    /// Returns `true` if this error is an invalid transaction error.
    pub fn is_invalid_transaction(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::InvalidTransaction(_))
    }
}
