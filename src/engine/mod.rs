pub mod difficulty;
pub mod scoring;
pub mod timer;
