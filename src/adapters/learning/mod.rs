//! External learning service adapters.

pub mod http;

pub use http::{HttpLearningClient, NullLearningSink};
