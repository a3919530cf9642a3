use std::sync::LazyLock;

use regex::Regex;

/// Markdown-style record link the model sometimes produces despite the
/// system prompt asking for anchor tags.
static RECORD_LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[(.*?)\]\(#&data-oe-model=(.*?)&data-oe-id=(.*?)\)")
        .expect("fail to create a regex for record links")
});

/// Rewrite every `[text](#&data-oe-model=M&data-oe-id=N)` into
/// `<a href='#' data-oe-model='M' data-oe-id='N'>text</a>`.
pub fn rewrite_links(text: &str) -> String {
    RECORD_LINK_PATTERN
        .replace_all(text, "<a href='#' data-oe-model='$2' data-oe-id='$3'>$1</a>")
        .into_owned()
}
