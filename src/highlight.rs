use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Style attached to `<ins>` spans of a comparison.
pub const INSERTION_STYLE: &str = "background-color: #d4edbc";
/// Style attached to `<del>` spans of a comparison.
pub const DELETION_STYLE: &str = "background-color: #ffcece";

// opening tags only, `<ins>` and `<ins class="...">` but not `<insert>`
static CHANGE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(ins|del)((?:\s[^>]*)?)>").unwrap());
static STYLE_ATTRIBUTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?:^|\s)style\s*=\s*""#).unwrap());

/// Mark every inserted and deleted span of a MediaWiki comparison.
///
/// The comparison markup (a sequence of `<tr>` rows with `<ins>`/`<del>` inline changes) is not parsed,
/// only the opening tags of the change spans are rewritten to carry [`INSERTION_STYLE`] or
/// [`DELETION_STYLE`]. Everything else is returned byte for byte, so the result can be embedded
/// directly by whatever renders it.
///
/// If a span already has a `style` attribute, the highlight is prepended to its value instead of
/// adding a second attribute.
pub fn highlight_changes(markup: &str) -> String {
    CHANGE_TAG
        .replace_all(markup, |caps: &Captures| {
            let tag = &caps[1];
            let attributes = &caps[2];
            let style = if tag == "ins" {
                INSERTION_STYLE
            } else {
                DELETION_STYLE
            };

            if let Some(m) = STYLE_ATTRIBUTE.find(attributes) {
                format!(
                    "<{tag}{}{style}; {}>",
                    &attributes[..m.end()],
                    &attributes[m.end()..]
                )
            } else {
                format!("<{tag}{attributes} style=\"{style}\">")
            }
        })
        .into_owned()
}
