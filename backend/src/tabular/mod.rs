pub mod classifier;
pub mod features;
pub mod tabular_service;
