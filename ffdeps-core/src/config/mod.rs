//! Configuration for ffdeps.
//!
//! Settings are stored as JSON in the user's config directory.

pub mod paths;
mod settings;

pub use settings::{Settings, DEFAULT_THROTTLE_WINDOW_SECS};
