pub mod targets;
pub mod testing;
pub mod tooling;
