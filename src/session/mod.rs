pub mod clock;
pub mod identity;
pub mod orchestrator;
pub mod quiz;
pub mod result;
pub mod state;
