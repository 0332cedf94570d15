use serde_json::Value;

/// Extract the first balanced `{...}` object starting at or after `from`.
/// Tracks string state so braces inside JSON strings do not unbalance the
/// scan.
fn balanced_object(text: &str, from: usize) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text[from..].find('{')? + from;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_object(candidate: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(candidate.trim()) {
        Ok(v @ Value::Object(_)) => Some(v),
        _ => None,
    }
}

/// After a label marker the model often opens a code fence before the
/// object; skip past the fence line if one is there.
fn skip_fence_opener(text: &str, mut pos: usize) -> usize {
    let rest = text[pos..].trim_start();
    pos = text.len() - rest.len();
    if rest.starts_with("```") {
        match text[pos..].find('\n') {
            Some(nl) => pos + nl + 1,
            None => text.len(),
        }
    } else {
        pos
    }
}

/// Contents of every ``` fenced block, language tag dropped.
fn fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after_open = &rest[open + 3..];
        let body_start = match after_open.find('\n') {
            Some(nl) => nl + 1,
            None => break,
        };
        let body = &after_open[body_start..];
        match body.find("```") {
            Some(close) => {
                blocks.push(&body[..close]);
                rest = &body[close + 3..];
            }
            None => break,
        }
    }
    blocks
}

/// Pull the labeled object out of free-form generated text.
///
/// Attempts, in order: the `LABEL:` marker followed by a balanced object
/// (fence-tolerant), any fenced block, the largest `{...}` span. Returns
/// `None` when nothing parses; never errors — callers treat `None` as
/// "block absent" and default.
pub fn extract(label: &str, text: &str) -> Option<Value> {
    let marker = format!("{label}:");
    if let Some(at) = text.find(&marker) {
        let scan_from = skip_fence_opener(text, at + marker.len());
        if let Some(candidate) = balanced_object(text, scan_from) {
            if let Some(v) = parse_object(candidate) {
                return Some(v);
            }
        }
    }

    for block in fenced_blocks(text) {
        if let Some(candidate) = balanced_object(block, 0) {
            if let Some(v) = parse_object(candidate) {
                return Some(v);
            }
        }
    }

    let first = text.find('{')?;
    let last = text.rfind('}')?;
    if last > first {
        return parse_object(&text[first..=last]);
    }
    None
}
