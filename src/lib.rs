pub mod chapters;
pub mod config;
pub mod decoder;
pub mod document;
pub mod error;
pub mod events;
pub mod line_counter;
pub mod lines;
pub mod logging;
pub mod progress;
pub mod search;
pub mod session;
pub mod store;
pub mod window_cache;

pub use config::ReaderConfig;
pub use error::{ReaderError, Result};
pub use events::{ReaderCommand, ReaderEvent};
pub use session::ReaderSession;
pub use store::DocumentStore;
