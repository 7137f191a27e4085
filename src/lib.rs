pub mod aggregator;
pub mod api;
pub mod model;
pub mod presentation;
pub mod settings;

pub use aggregator::collect;
pub use api::{validate_credentials, Client, Error};
pub use model::Snapshot;
