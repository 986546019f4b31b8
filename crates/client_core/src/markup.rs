//! Whitelist parser for bot reply markup.
//!
//! The chat endpoint decorates replies with a handful of inline tags
//! (`<strong>price</strong>`, line breaks). Replies are still remote input,
//! so nothing is ever handed to a markup renderer: this parser keeps only
//! emphasis and line breaks, drops `<script>`/`<style>` together with their
//! contents, and strips every other tag while keeping its inner text.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplySegment {
    pub text: String,
    pub emphasis: bool,
}

/// Parse a reply into emphasis-annotated text runs.
pub fn parse_reply_markup(reply: &str) -> Vec<ReplySegment> {
    let mut segments: Vec<ReplySegment> = Vec::new();
    let mut current = String::new();
    let mut emphasis_depth: u32 = 0;
    let mut rest = reply;

    while !rest.is_empty() {
        let Some(mark) = rest.find(['<', '&']) else {
            current.push_str(rest);
            break;
        };
        current.push_str(&rest[..mark]);
        rest = &rest[mark..];

        if rest.starts_with('&') {
            match decode_entity(rest) {
                Some((decoded, len)) => {
                    current.push(decoded);
                    rest = &rest[len..];
                }
                None => {
                    current.push('&');
                    rest = &rest[1..];
                }
            }
            continue;
        }

        let Some(close) = rest.find('>') else {
            // Unterminated tag: treat the remainder as literal text.
            current.push_str(rest);
            break;
        };
        let raw_tag = &rest[1..close];
        rest = &rest[close + 1..];

        let (closing, name) = tag_name(raw_tag);
        match name.as_str() {
            "strong" | "b" | "em" | "i" => {
                flush(&mut segments, &mut current, emphasis_depth);
                if closing {
                    emphasis_depth = emphasis_depth.saturating_sub(1);
                } else {
                    emphasis_depth += 1;
                }
            }
            "br" => current.push('\n'),
            "script" | "style" if !closing => {
                // Drop the element contents wholesale.
                let closer = format!("</{name}");
                match rest.to_ascii_lowercase().find(&closer) {
                    Some(start) => {
                        let after_closer = &rest[start + closer.len()..];
                        match after_closer.find('>') {
                            Some(end) => rest = &after_closer[end + 1..],
                            None => rest = "",
                        }
                    }
                    None => rest = "",
                }
            }
            _ => {
                // Unknown tag: stripped, inner text survives on its own.
            }
        }
    }

    flush(&mut segments, &mut current, emphasis_depth);
    segments
}

/// Reply with all markup removed; used where only text fits (logs, CLI).
pub fn reply_plain_text(reply: &str) -> String {
    parse_reply_markup(reply)
        .into_iter()
        .map(|segment| segment.text)
        .collect()
}

fn flush(segments: &mut Vec<ReplySegment>, current: &mut String, emphasis_depth: u32) {
    if current.is_empty() {
        return;
    }
    let emphasis = emphasis_depth > 0;
    match segments.last_mut() {
        Some(last) if last.emphasis == emphasis => last.text.push_str(current),
        _ => segments.push(ReplySegment {
            text: current.clone(),
            emphasis,
        }),
    }
    current.clear();
}

fn tag_name(raw_tag: &str) -> (bool, String) {
    let trimmed = raw_tag.trim();
    let (closing, trimmed) = match trimmed.strip_prefix('/') {
        Some(inner) => (true, inner),
        None => (false, trimmed),
    };
    let name = trimmed
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    (closing, name)
}

fn decode_entity(rest: &str) -> Option<(char, usize)> {
    for (entity, decoded) in [
        ("&amp;", '&'),
        ("&lt;", '<'),
        ("&gt;", '>'),
        ("&quot;", '"'),
        ("&#39;", '\''),
    ] {
        if rest.starts_with(entity) {
            return Some((decoded, entity.len()));
        }
    }
    None
}
