//! Service configuration: a TOML file picked by `--settings`, plus
//! environment overrides. See `bin/settings_demo.rs` for usage.

mod cli;
pub use clap::Parser;
pub use cli::*;

mod settings;
pub use settings::*;
