//! Domain layer: pure models and repository ports.

pub mod ident;
pub mod models;
pub mod ports;
