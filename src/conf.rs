mod configuration;
pub mod keys;

pub use configuration::Configuration;
