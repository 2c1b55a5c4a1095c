//! Dependency drop-in rendering and parsing
//!
//! Each edge becomes a strength directive (`Requires=`/`Wants=`) followed by
//! an `After=` ordering directive, because systemd treats requirement and
//! ordering as independent settings.

use super::parser::{self, ParseError};
use crate::graph::DependencyKind;

/// File name of the managed drop-in inside `<unit>.d/`
pub const DROPIN_FILE: &str = "dependencies.conf";

const HEADER: &str = "# Managed by composectl. Manual edits are overwritten.";

/// Render `(kind, unit)` pairs into a drop-in, preserving their order
pub fn render_dependencies<'a, I>(edges: I) -> String
where
    I: IntoIterator<Item = (DependencyKind, &'a str)>,
{
    let mut out = String::new();
    out.push_str(HEADER);
    out.push('\n');
    out.push_str("[Unit]\n");

    for (kind, unit) in edges {
        out.push_str(&format!("{}={}\n", kind.directive(), unit));
        out.push_str(&format!("After={}\n", unit));
    }

    out
}

/// Read the strength directives of a drop-in back into `(kind, unit)` pairs.
///
/// Order follows the file. A unit named under both directives keeps its
/// first position and is hard, as systemd applies `Requires=` regardless of
/// an extra `Wants=`. `After=` lines carry no strength and are not returned.
pub fn parse_dependencies(content: &str) -> Result<Vec<(DependencyKind, String)>, ParseError> {
    let parsed = parser::parse_file(content)?;
    let Some(unit) = parsed.get("[Unit]") else {
        return Ok(Vec::new());
    };

    let mut entries: Vec<(u32, DependencyKind, &str)> = Vec::new();
    for kind in [DependencyKind::Hard, DependencyKind::Soft] {
        let key = kind.directive().to_uppercase();
        if let Some(values) = unit.get(&key) {
            entries.extend(values.iter().map(|(pos, v)| (*pos, kind, v.as_str())));
        }
    }
    entries.sort_by_key(|(pos, _, _)| *pos);

    let mut edges: Vec<(DependencyKind, String)> = Vec::new();
    for (_, kind, name) in entries {
        match edges.iter_mut().find(|(_, existing)| existing.as_str() == name) {
            Some(edge) => {
                if kind == DependencyKind::Hard {
                    edge.0 = kind;
                }
            }
            None => edges.push((kind, name.to_string())),
        }
    }

    Ok(edges)
}
