pub mod document;
pub mod errors;
pub mod events;

pub use document::Document;
pub use errors::RelayError;
pub use events::{parse_update, RelayEvent};
