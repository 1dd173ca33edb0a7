//! `${NAME}` placeholder expansion.

use crate::env::{HostEnv, VariableStore};
use crate::error::ParseError;

const OPEN: &str = "${";
const CLOSE: char = '}';

/// Replace every `${NAME}` in `raw`, left to right.
///
/// Names resolve against `vars` first and `host` second. Substituted values
/// are copied as-is and never rescanned. `${}` and an unterminated `${` are
/// not placeholders and are kept verbatim.
pub fn substitute(raw: &str, vars: &VariableStore, host: &dyn HostEnv) -> Result<String, ParseError> {
    let mut out = String::with_capacity(raw.len());
    let mut cursor = 0;

    while let Some(offset) = raw[cursor..].find(OPEN) {
        let start = cursor + offset;
        let name_start = start + OPEN.len();

        let Some(len) = raw[name_start..].find(CLOSE) else {
            break;
        };
        if len == 0 {
            out.push_str(&raw[cursor..name_start + 1]);
            cursor = name_start + 1;
            continue;
        }

        let name = &raw[name_start..name_start + len];
        let value = vars
            .get_var(name, host)
            .ok_or_else(|| ParseError::UnresolvedVariable {
                name: name.to_string(),
            })?;

        out.push_str(&raw[cursor..start]);
        out.push_str(&value);
        cursor = name_start + len + 1;
    }

    out.push_str(&raw[cursor..]);
    Ok(out)
}
