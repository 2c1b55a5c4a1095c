//! systemd unit fragments
//!
//! Parsing and rendering of the drop-in files systemd reads from
//! `<unit>.d/*.conf` at daemon-reload.

mod dropin;
mod parser;

pub use dropin::{parse_dependencies, render_dependencies, DROPIN_FILE};
pub use parser::{parse_file, ParseError, ParsedFile, ParsedSection};
