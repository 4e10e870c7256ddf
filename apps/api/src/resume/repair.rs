//! Best-effort recovery of a JSON value from agent output.
//!
//! Strategies run in order until one yields a value:
//! 1. the text as-is
//! 2. the interior of a fenced code block
//! 3. the slice from the first `{`/`[` to the last matching closer
//!
//! Each strategy retries its candidate through `lenient_repair` before giving up.

use serde_json::Value;
use tracing::debug;

type Strategy = fn(&str) -> Option<Value>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("as-is", parse_as_is),
    ("fenced", parse_fenced),
    ("sliced", parse_sliced),
];

pub fn recover_json(raw: &str) -> Option<Value> {
    STRATEGIES.iter().find_map(|(name, strategy)| {
        let value = strategy(raw)?;
        debug!("Recovered JSON via '{name}' strategy");
        Some(value)
    })
}

/// Interior of a payload wrapped in exactly one outer code fence. The language
/// tag on the opening fence, if any, is dropped.
pub fn unwrap_code_fence(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    let rest = trimmed.strip_prefix("```")?;
    let body_start = rest.find('\n')?;
    let tag = &rest[..body_start];
    if !tag
        .trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return None;
    }
    let body = rest[body_start + 1..].strip_suffix("```")?;
    if body.contains("\n```") {
        return None;
    }
    Some(body.trim())
}

fn parse_as_is(raw: &str) -> Option<Value> {
    parse_candidate(raw.trim())
}

fn parse_fenced(raw: &str) -> Option<Value> {
    if let Some(inner) = unwrap_code_fence(raw) {
        return parse_candidate(inner);
    }
    // Fence embedded in surrounding prose.
    let start = raw.find("```")?;
    let after_tag = start + 3 + raw[start + 3..].find('\n')? + 1;
    let end = after_tag + raw[after_tag..].find("```")?;
    parse_candidate(raw[after_tag..end].trim())
}

fn parse_sliced(raw: &str) -> Option<Value> {
    let start = raw.find(|c: char| c == '{' || c == '[')?;
    let closer = if raw[start..].starts_with('{') { '}' } else { ']' };
    let end = raw.rfind(closer)?;
    if end <= start {
        return None;
    }
    parse_candidate(&raw[start..=end])
}

fn parse_candidate(candidate: &str) -> Option<Value> {
    if candidate.is_empty() {
        return None;
    }
    serde_json::from_str(candidate)
        .ok()
        .or_else(|| serde_json::from_str(&lenient_repair(candidate)).ok())
}

/// Fixes the mistakes models commonly make in hand-written JSON: smart quotes,
/// trailing commas, Python literals, and missing closing brackets or quotes.
pub fn lenient_repair(input: &str) -> String {
    let normalized: String = input
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' => '"',
            other => other,
        })
        .collect();

    let mut out = String::with_capacity(normalized.len() + 8);
    let mut closers: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;
    let mut word = String::new();

    let flush_word = |word: &mut String, out: &mut String| {
        let replacement = match word.as_str() {
            "True" => "true",
            "False" => "false",
            "None" => "null",
            other => other,
        };
        out.push_str(replacement);
        word.clear();
    };

    for c in normalized.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        if c.is_ascii_alphabetic() {
            word.push(c);
            continue;
        }
        flush_word(&mut word, &mut out);

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '{' => {
                closers.push('}');
                out.push(c);
            }
            '[' => {
                closers.push(']');
                out.push(c);
            }
            '}' | ']' => {
                strip_trailing_comma(&mut out);
                if closers.last() == Some(&c) {
                    closers.pop();
                }
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    flush_word(&mut word, &mut out);

    if in_string {
        out.push('"');
    }
    strip_trailing_comma(&mut out);
    while let Some(closer) = closers.pop() {
        out.push(closer);
    }
    out
}

fn strip_trailing_comma(out: &mut String) {
    let kept = out.trim_end().len();
    if out[..kept].ends_with(',') {
        out.truncate(kept - 1);
    }
}
