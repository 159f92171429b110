pub mod error;
mod json_bridge;
pub mod profile;
pub mod schema;
pub mod store;

pub use error::{Result, StoreError};
pub use profile::{ProfileStore, default_base_dir, load_config, parse_config};
pub use store::Store;
