//! INI-style drop-in parser
//!
//! Parses systemd unit fragments into ordered key/value data.
//! Sections with the same name are merged, as systemd does for drop-ins.

use std::collections::HashMap;

/// A section maps each (uppercased) key to its values.
/// The u32 is the position of the value in the whole file, so values of
/// different keys can be interleaved back into file order.
pub type ParsedSection = HashMap<String, Vec<(u32, String)>>;

/// A parsed fragment maps section headers (e.g. `[Unit]`) to their contents
pub type ParsedFile = HashMap<String, ParsedSection>;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}: unterminated section header '{text}'")]
    BadSection { line: usize, text: String },

    #[error("line {line}: setting outside of any section: '{text}'")]
    OrphanSetting { line: usize, text: String },
}

/// Keys that accept space-separated multiple values
const SPACE_SEPARATED_KEYS: &[&str] = &[
    "AFTER", "BEFORE", "REQUIRES", "WANTS", "REQUISITE", "BINDSTO", "PARTOF", "CONFLICTS",
];

/// Parse a drop-in fragment from a string
pub fn parse_file(content: &str) -> Result<ParsedFile, ParseError> {
    let mut sections: ParsedFile = HashMap::new();
    let mut current: Option<String> = None;
    let mut position = 0u32;

    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();

        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }

        if line.starts_with('[') {
            if !line.ends_with(']') {
                return Err(ParseError::BadSection {
                    line: index + 1,
                    text: line.to_string(),
                });
            }
            sections.entry(line.to_string()).or_default();
            current = Some(line.to_string());
            continue;
        }

        let Some((name, value)) = line.split_once('=') else {
            log::debug!("Ignoring line {} without '=': {}", index + 1, line);
            continue;
        };

        let Some(section) = current.as_ref().and_then(|s| sections.get_mut(s)) else {
            return Err(ParseError::OrphanSetting {
                line: index + 1,
                text: line.to_string(),
            });
        };

        let name = name.trim().to_uppercase();
        let value = value.trim();
        let entries = section.entry(name.clone()).or_default();

        // An empty assignment resets the list, e.g. `Wants=`
        if value.is_empty() {
            entries.clear();
            continue;
        }

        if SPACE_SEPARATED_KEYS.contains(&name.as_str()) {
            for v in value.split_whitespace() {
                entries.push((position, v.to_string()));
                position += 1;
            }
        } else {
            entries.push((position, value.to_string()));
            position += 1;
        }
    }

    Ok(sections)
}
