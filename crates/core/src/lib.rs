pub mod models;
pub mod normalize;

pub use models::*;
pub use normalize::{detect_language, normalize};
