// Crate root library declaration and module exports.
pub mod alarm;
pub mod config;
pub mod context;
pub mod model;
pub mod session;
pub mod storage;
pub mod store;
pub mod system;
