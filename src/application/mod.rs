//! Application layer managing wizard state and form workflows.
//!
//! This module coordinates between the domain layer and presentation layer:
//! the wizard state machine, the form controller, and the terminal app state.

pub mod form;
pub mod state;
pub mod wizard;

pub use form::*;
pub use state::*;
pub use wizard::*;
