//! Inline terminal widgets.

pub mod spinner;

pub use spinner::Spinner;
