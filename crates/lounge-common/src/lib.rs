pub mod errors;
pub mod id;

pub use errors::{ConfigError, LoungeError};
pub use id::{new_correlation_id, new_id, short_label};

pub type Result<T> = std::result::Result<T, LoungeError>;
