//! Regex-based implementation of the `Sanitizer` port.
//!
//! Two rule sets:
//! - `Message`: content-preserving. Removes active content (script-like
//!   blocks, stray dangerous tags, inline event handlers, script URL schemes)
//!   and leaves ordinary text and harmless markup alone.
//! - `UserInput`: display names. Removes dangerous blocks, then every tag and
//!   control character, trims, and bounds the length.
//!
//! Each removed dangerous construct counts as one threat. Input above the
//! size limit is rejected with a `SanitizeError`.

use regex::{Captures, Regex};
use sessionvault_core::sanitize::{SanitizeError, SanitizeScope, Sanitized, Sanitizer};

/// Tags removed together with their content.
const BLOCK_TAGS: &[&str] = &["script", "iframe", "object", "embed", "style", "noscript", "template"];

/// Tags removed wherever they appear, opening or closing.
const STRAY_TAGS: &str =
    "script|iframe|object|embed|style|form|meta|link|base|applet|frame|frameset|noscript|template|svg";

pub const DEFAULT_MAX_INPUT_BYTES: usize = 1024 * 1024;

pub struct RegexSanitizer {
    block: Regex,
    stray_tag: Regex,
    script_scheme: Regex,
    open_tag: Regex,
    event_handler: Regex,
    any_tag: Regex,
    control: Regex,
    max_name_chars: usize,
    max_input_bytes: usize,
}

impl RegexSanitizer {
    pub fn new(max_name_chars: usize) -> Result<Self, regex::Error> {
        let block = BLOCK_TAGS
            .iter()
            .map(|tag| format!(r"<{tag}\b[^>]*>.*?</{tag}\s*>"))
            .collect::<Vec<_>>()
            .join("|");

        Ok(Self {
            block: Regex::new(&format!("(?is){block}"))?,
            stray_tag: Regex::new(&format!(r"(?i)</?(?:{STRAY_TAGS})\b[^>]*>"))?,
            script_scheme: Regex::new(r"(?i)(?:java|vb)script\s*:|data\s*:\s*text/html")?,
            open_tag: Regex::new(r"(?s)<[a-zA-Z][^>]*>")?,
            event_handler: Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#)?,
            any_tag: Regex::new(r"(?s)</?[a-zA-Z!][^>]*>")?,
            control: Regex::new(r"\p{Cc}")?,
            max_name_chars: max_name_chars.max(1),
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
        })
    }

    pub fn with_max_input_bytes(mut self, max_input_bytes: usize) -> Self {
        self.max_input_bytes = max_input_bytes;
        self
    }

    fn strip_active_content(&self, text: &str, threats: &mut u32) -> String {
        let text = strip(&self.block, text, threats);
        let text = strip(&self.stray_tag, &text, threats);
        let text = strip(&self.script_scheme, &text, threats);
        self.open_tag
            .replace_all(&text, |caps: &Captures| {
                let tag = &caps[0];
                strip(&self.event_handler, tag, threats)
            })
            .into_owned()
    }

    fn sanitize_message(&self, text: &str) -> Sanitized {
        let mut threats = 0;
        let text = self.strip_active_content(text, &mut threats);
        Sanitized {
            text,
            threats_found: threats,
        }
    }

    fn sanitize_name(&self, text: &str) -> Sanitized {
        let mut threats = 0;
        let text = self.strip_active_content(text, &mut threats);
        let text = self.any_tag.replace_all(&text, "");
        let text = self.control.replace_all(&text, "");
        Sanitized {
            text: text.trim().chars().take(self.max_name_chars).collect(),
            threats_found: threats,
        }
    }
}

impl Sanitizer for RegexSanitizer {
    fn sanitize(&self, text: &str, scope: SanitizeScope) -> Result<Sanitized, SanitizeError> {
        if text.len() > self.max_input_bytes {
            return Err(SanitizeError {
                scope,
                reason: format!("input exceeds {} bytes", self.max_input_bytes),
            });
        }
        Ok(match scope {
            SanitizeScope::Message => self.sanitize_message(text),
            SanitizeScope::UserInput => self.sanitize_name(text),
        })
    }
}

/// Remove every match of `re`, counting each as a threat.
fn strip(re: &Regex, text: &str, threats: &mut u32) -> String {
    let found = re.find_iter(text).count();
    if found == 0 {
        return text.to_string();
    }
    *threats += u32::try_from(found).unwrap_or(u32::MAX);
    re.replace_all(text, "").into_owned()
}
