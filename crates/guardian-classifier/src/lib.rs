pub mod client;
pub mod error;
pub mod policy;

pub use client::{ClarifaiClient, ClarifaiConfig, Classifier};
pub use error::ClassifierError;
pub use policy::ModerationPolicy;
