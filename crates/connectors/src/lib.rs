pub mod connector;
pub mod convert;
pub mod cursor;
pub mod error;
pub mod memory;
