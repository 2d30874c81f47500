use once_cell::sync::Lazy;
use regex::Regex;

static SECRET_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(
            r#"(?i)(token|secret|password|private_key)\s*["']?\s*[:=]\s*["']?([A-Za-z0-9_\-\.]{6,})["']?"#,
        )
        .expect("valid regex"),
        Regex::new(r"(?i)\b(bearer)\s+([A-Za-z0-9_\-\.=]{8,})").expect("valid regex"),
        Regex::new(r"\b(gh[opsu]_[A-Za-z0-9]{20,})\b").expect("valid regex"),
        Regex::new(r"\b(github_pat_[A-Za-z0-9_]{20,})\b").expect("valid regex"),
        Regex::new(r"\b(eyJ[A-Za-z0-9_\-]+\.[A-Za-z0-9_\-]+\.[A-Za-z0-9_\-]*)")
            .expect("valid regex"),
    ]
});

/// Response body with credentials replaced by placeholders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redacted {
    pub content: String,
    pub redaction_count: usize,
}

/// Scrubs credentials out of upstream response bodies before they reach logs or errors.
#[derive(Debug, Default, Clone)]
pub struct Redactor {
    /// Also masks any long opaque token, keyed or not.
    aggressive: bool,
}

impl Redactor {
    pub fn new(aggressive: bool) -> Self {
        Self { aggressive }
    }

    pub fn redact(&self, input: &str) -> Redacted {
        let mut redacted = SECRET_PATTERNS.iter().fold(
            Redacted {
                content: input.to_string(),
                redaction_count: 0,
            },
            |acc, pattern| {
                let hits = pattern.find_iter(&acc.content).count();
                if hits == 0 {
                    return acc;
                }
                Redacted {
                    content: pattern.replace_all(&acc.content, mask).into_owned(),
                    redaction_count: acc.redaction_count + hits,
                }
            },
        );

        if self.aggressive {
            let mut long_tokens = 0usize;
            let content = redacted
                .content
                .split_whitespace()
                .map(|word| {
                    if is_opaque_token(word) {
                        long_tokens += 1;
                        "[REDACTED_LONG_TOKEN]"
                    } else {
                        word
                    }
                })
                .collect::<Vec<_>>()
                .join(" ");
            redacted.content = content;
            redacted.redaction_count += long_tokens;
        }

        redacted
    }
}

/// Keyed patterns keep their key name.
fn mask(caps: &regex::Captures<'_>) -> String {
    match (caps.len(), caps.get(1)) {
        (len, Some(key)) if len > 2 => format!("{}=[REDACTED]", key.as_str().to_ascii_lowercase()),
        _ => "[REDACTED]".to_string(),
    }
}

fn is_opaque_token(word: &str) -> bool {
    word.len() > 48 && word.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
