pub mod error_type;
pub mod record;
pub mod validate;

pub use error_type::ErrorType;
pub use record::CanonicalRecord;
pub use validate::{
    validate_document, validate_record, validate_semantic, ValidationResult, Violation,
    ViolationCode,
};
