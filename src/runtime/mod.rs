//! Background task primitives.

pub mod timer;
