mod bound;
pub use bound::{Bound, Operation};

mod def;
pub use def::{FieldDef, FieldDefTy, ModelDef};

mod field;
pub use field::{Field, FieldId, FieldTy};

mod model;
pub use model::{Model, ModelId, PrimaryKey};

mod relation;
pub use relation::OneToOne;

mod schema;
pub use schema::Schema;
