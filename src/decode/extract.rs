//! Shared cleanup applied to model output before decoding.

/// Strip reasoning blocks and an enclosing markdown fence, then trim.
///
/// # Examples
///
/// ```
/// use llm_harness::decode::preprocess;
///
/// assert_eq!(preprocess("<think>hmm</think>\n<a>1</a>\n"), "<a>1</a>");
/// assert_eq!(preprocess("```xml\n<a>1</a>\n```"), "<a>1</a>");
/// ```
pub fn preprocess(text: &str) -> String {
    let stripped = strip_think_tags(text);
    let trimmed = stripped.trim();
    match unfence(trimmed) {
        Some(inner) => inner.to_string(),
        None => trimmed.to_string(),
    }
}

/// Remove every `<think>…</think>` and `<thinking>…</thinking>` block.
///
/// An unclosed block swallows the rest of the text.
pub fn strip_think_tags(text: &str) -> String {
    let once = strip_block(text, "<think>", "</think>");
    strip_block(&once, "<thinking>", "</thinking>")
}

fn strip_block(text: &str, open: &str, close: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(open) {
        out.push_str(&rest[..start]);
        match rest[start..].find(close) {
            Some(end) => rest = &rest[start + end + close.len()..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// If the whole of `text` is one fenced code block, return its body.
fn unfence(text: &str) -> Option<&str> {
    let body = text.strip_prefix("```")?.strip_suffix("```")?;
    let newline = body.find('\n')?;
    Some(body[newline + 1..].trim())
}

/// Body of the first fenced code block anywhere in `text`, with its
/// language hint (`None` for a bare fence).
pub fn extract_code_block(text: &str) -> Option<(Option<&str>, &str)> {
    let open = text.find("```")?;
    let after = &text[open + 3..];
    let newline = after.find('\n')?;
    let lang = after[..newline].trim();
    let body = &after[newline + 1..];
    let close = body.find("```")?;
    let lang = if lang.is_empty() { None } else { Some(lang) };
    Some((lang, body[..close].trim()))
}

/// The last top-level `open … close` region of `text`, honouring nesting and
/// ignoring delimiters inside double-quoted strings.
pub fn find_bracketed(text: &str, open: char, close: char) -> Option<&str> {
    let mut best = None;
    let mut depth = 0usize;
    let mut start = 0;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        if ch == '"' && depth > 0 {
            in_string = true;
        } else if ch == open {
            if depth == 0 {
                start = i;
            }
            depth += 1;
        } else if ch == close && depth > 0 {
            depth -= 1;
            if depth == 0 {
                best = Some(&text[start..i + ch.len_utf8()]);
            }
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_think_complete_and_multiple() {
        assert_eq!(strip_think_tags("<think>a</think>mid<thinking>b</thinking>end"), "midend");
    }

    #[test]
    fn strip_think_unclosed_drops_tail() {
        assert_eq!(strip_think_tags("keep<think>reasoning without close"), "keep");
    }

    #[test]
    fn preprocess_leaves_plain_markup() {
        let input = "  <shopping-list></shopping-list>  ";
        assert_eq!(preprocess(input), "<shopping-list></shopping-list>");
    }

    #[test]
    fn preprocess_only_unfences_whole_text() {
        let input = "Here you go:\n```xml\n<a/>\n```";
        assert_eq!(preprocess(input), input);
    }

    #[test]
    fn extract_code_block_with_lang() {
        let (lang, body) = extract_code_block("Here:\n```json\n{\"a\": 1}\n```").unwrap();
        assert_eq!(lang, Some("json"));
        assert_eq!(body, "{\"a\": 1}");
    }

    #[test]
    fn extract_code_block_bare() {
        let (lang, body) = extract_code_block("```\n[1]\n```").unwrap();
        assert_eq!(lang, None);
        assert_eq!(body, "[1]");
    }

    #[test]
    fn find_bracketed_nested_and_later() {
        assert_eq!(
            find_bracketed(r#"{"a": 1} then {"outer": {"inner": [1]}}"#, '{', '}'),
            Some(r#"{"outer": {"inner": [1]}}"#)
        );
    }

    #[test]
    fn find_bracketed_ignores_delimiters_in_strings() {
        assert_eq!(
            find_bracketed(r#"x {"text": "a } b"} y"#, '{', '}'),
            Some(r#"{"text": "a } b"}"#)
        );
    }

    #[test]
    fn find_bracketed_unbalanced() {
        assert_eq!(find_bracketed("{ never closed", '{', '}'), None);
    }
}
