pub mod analyze;
pub mod code;
pub mod execution;
pub mod system;
