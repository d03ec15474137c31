use super::{FieldId, ModelId};
use crate::stmt::Type;

/// One side of a resolved one-to-one relation.
///
/// Both sides point at each other through `pair`. Exactly one of them
/// holds the foreign key column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OneToOne {
    /// The model on the other side
    pub target: ModelId,

    /// The field on `target` pointing back to this one
    pub pair: FieldId,

    /// True if this side's table stores the foreign key
    pub owns_key: bool,

    /// Type of the target's primary key, which is what the field holds
    pub key_ty: Type,
}
