//! Configuration loading and shared configuration types for the relay services.
//!
//! Configuration is layered: a `base` file, an environment-specific overlay
//! (`dev`/`prod`), and `APP_`-prefixed environment variable overrides applied
//! on top. The shared structs carry the connection and listener settings that
//! both the core library and the worker binary consume.

pub mod environment;
pub mod load;
pub mod shared;

pub use load::{LoadConfigError, load_config};
