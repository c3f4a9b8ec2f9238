pub mod appointment;
pub mod document;
pub mod prescription;

pub use appointment::*;
pub use document::*;
pub use prescription::*;
