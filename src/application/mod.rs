pub mod coordinator;
pub mod state_machine;
