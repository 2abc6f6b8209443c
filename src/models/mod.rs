pub mod enums;
pub mod partial;
pub mod record;
pub mod validate;

pub use enums::*;
pub use partial::PartialRecord;
pub use record::{fields, OperatorRecord, META_WARNINGS};
