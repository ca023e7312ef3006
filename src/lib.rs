pub mod api;
pub mod extract;
pub mod fetch;
pub mod metrics;
pub mod recorder;
pub mod store;
pub mod structures;
pub mod validate;
