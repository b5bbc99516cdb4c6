/*
 * Copyright (c) Chronicle Contributors.
 *
 * This source code is licensed under the MIT license found in the
 * LICENSE file in the root directory of this source tree.
 */

use crate::error::ConfigError;

/// Parses a flat `section.key = value` document (spec.md SPEC_FULL
/// §6.6). Blank lines and lines starting with `#` or `;` are ignored.
/// Values may be continued onto the next line by indenting it; the
/// continuation is joined with a single space, matching how hgrc-style
/// files fold long values.
pub(crate) fn parse(text: &str) -> Result<Vec<(String, String, String)>, ConfigError> {
    let mut out = Vec::new();
    let mut pending: Option<(String, String, String)> = None;

    for (lineno, raw_line) in text.lines().enumerate() {
        if raw_line.starts_with([' ', '\t']) && !raw_line.trim().is_empty() {
            if let Some((_, _, ref mut value)) = pending {
                value.push(' ');
                value.push_str(raw_line.trim());
                continue;
            }
        }
        if let Some(entry) = pending.take() {
            out.push(entry);
        }

        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        let (lhs, value) = line.split_once('=').ok_or(ConfigError::Syntax {
            line: lineno + 1,
            reason: "expected `section.key = value`".to_owned(),
        })?;
        let lhs = lhs.trim();
        let (section, key) = lhs.split_once('.').ok_or(ConfigError::Syntax {
            line: lineno + 1,
            reason: format!("expected `section.key`, got `{lhs}`"),
        })?;
        if section.is_empty() || key.is_empty() {
            return Err(ConfigError::Syntax {
                line: lineno + 1,
                reason: format!("expected `section.key`, got `{lhs}`"),
            });
        }
        pending = Some((section.to_owned(), key.to_owned(), value.trim().to_owned()));
    }
    if let Some(entry) = pending.take() {
        out.push(entry);
    }
    Ok(out)
}
