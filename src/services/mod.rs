pub mod admin_gate;
pub mod evaluations;
pub mod export;
pub mod inactivity;
