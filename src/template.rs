//! Template formatter
//!
//! Substitutes `%{name}` tokens from a [`ResultStore`]. Names are limited to
//! `[A-Za-z0-9_-]+`; anything else is copied through literally.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{ProbeError, Result};
use crate::store::ResultStore;

static FIELD_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"%\{([A-Za-z0-9_-]+)\}").expect("field token pattern is valid"));

/// Render `template` against `store`
///
/// Fails with [`ProbeError::MissingField`] on the first unknown name; nothing
/// is returned for a partially rendered template.
pub fn render(template: &str, store: &ResultStore) -> Result<String> {
    let mut rendered = String::with_capacity(template.len());
    let mut last = 0;

    for captures in FIELD_TOKEN.captures_iter(template) {
        let token = captures.get_match();
        let name = &captures[1];
        let value = store
            .get(name)
            .ok_or_else(|| ProbeError::MissingField(name.to_string()))?;

        rendered.push_str(&template[last..token.start()]);
        rendered.push_str(value);
        last = token.end();
    }

    rendered.push_str(&template[last..]);
    Ok(rendered)
}
