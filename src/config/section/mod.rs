//! Configuration section definitions.
//!
//! Each module corresponds to a section in `skriv.toml`:
//!
//! | Module  | TOML Section | Purpose                        |
//! |---------|--------------|--------------------------------|
//! | `build` | `[build]`    | Source and output directories  |
//! | `serve` | `[serve]`    | HTTP server and file watching  |

mod build;
mod serve;

pub use build::BuildSectionConfig;
pub use serve::ServeConfig;
