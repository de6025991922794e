//! Domain layer: field descriptors, phone formatting and the schema compiler.

pub mod errors;
pub mod format;
pub mod models;
pub mod schema;

pub use errors::*;
pub use format::*;
pub use models::*;
pub use schema::*;
