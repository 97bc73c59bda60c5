mod config;
mod extract;
mod index;

pub use config::{GazetteerConfig, GazetteerPayload};
pub use extract::{ExtractError, LocationExtractor};
pub use index::{AliasIndex, GazetteerError};
