pub mod batcher;
pub mod normalize;
pub mod orchestrator;
pub mod sender;
pub mod session;
