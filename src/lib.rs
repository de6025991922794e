//! TAXWIZ - Terminal State Tax Form Wizard
//!
//! A three-step terminal wizard that fetches a state's tax form schema,
//! validates the user's answers, and requests the generated PDF documents.

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
pub use application::*;
