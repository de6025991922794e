use thiserror::Error;

/// Failures raised while compiling a form schema from field descriptors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    #[error("Duplicate field name in form schema: {0}")]
    DuplicateField(String),
}

pub type SchemaResult<T> = Result<T, SchemaError>;
