//! Core terminal interfaces.

pub mod output;
pub mod terminal;
