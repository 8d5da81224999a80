//! Assignment: agreement matching and balance application

pub mod balance;
pub mod matcher;

pub use balance::*;
pub use matcher::*;
