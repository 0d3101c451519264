pub mod descriptors;
pub mod snapshot;
pub mod ute_models;
