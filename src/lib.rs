pub mod assembly;
pub mod config;
pub mod data;
pub mod errors;
pub mod etl;
