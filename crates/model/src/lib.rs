pub mod core;
pub mod frame;
pub mod query;
pub mod wire;
