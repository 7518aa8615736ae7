//! Route modules for the HTTP surface.

pub mod health;
pub mod workflow;
