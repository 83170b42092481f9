pub mod check;
pub mod validator;

pub use check::{Check, Rejection};
pub use validator::{BrainImageValidator, ValidationResult};
