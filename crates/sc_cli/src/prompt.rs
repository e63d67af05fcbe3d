//! Splits a typed prompt into message text and `@path` image attachments.

use std::path::Path;
use std::sync::OnceLock;

use chat_provider::ImageAttachment;
use regex::Regex;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedPrompt {
    pub text: String,
    pub images: Vec<ImageAttachment>,
}

fn attachment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"@(?:"([^"]+)"|'([^']+)'|(\S+))"#).expect("attachment regex must compile")
    })
}

/// Parses `input`, resolving relative paths against `base_dir`.
///
/// `@path`, `@"path with spaces"` and `@'path'` tokens are removed from the
/// text. Tokens naming an existing image file become attachments; the rest
/// are dropped with a warning. Whitespace in the remaining text is collapsed.
pub fn parse_prompt(input: &str, base_dir: &Path) -> ParsedPrompt {
    let mut images = Vec::new();

    for captures in attachment_pattern().captures_iter(input) {
        let Some(raw) = captures
            .get(1)
            .or_else(|| captures.get(2))
            .or_else(|| captures.get(3))
        else {
            continue;
        };

        let path = base_dir.join(raw.as_str());
        let attachment = path
            .is_file()
            .then(|| ImageAttachment::from_path(&path))
            .flatten();
        match attachment {
            Some(image) => {
                debug!(path = %path.display(), mime = image.mime_type, "attaching image");
                images.push(image);
            }
            None => warn!(
                path = %path.display(),
                "file does not exist or is not a supported image; ignoring"
            ),
        }
    }

    let stripped = attachment_pattern().replace_all(input, " ");
    ParsedPrompt {
        text: stripped.split_whitespace().collect::<Vec<_>>().join(" "),
        images,
    }
}
