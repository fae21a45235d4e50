//! Project configuration loaded from `.housevault.toml`.

pub mod settings;

pub use settings::Settings;
