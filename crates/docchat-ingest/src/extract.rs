//! Text extraction per document kind
//!
//! PDF extraction goes through `pdf-extract`; Markdown gets light markup
//! stripping so headings and links do not pollute the embedding space;
//! plain text is validated UTF-8. Extraction that yields no text fails the
//! ingestion rather than indexing an empty document.

use docchat_core::{ChatError, DocumentKind, Result};

/// Detect the document kind from a file name
///
/// Unrecognized extensions are a caller error, not a crash.
pub fn detect_kind(file_name: &str) -> Result<DocumentKind> {
    DocumentKind::from_name(file_name).ok_or_else(|| {
        let ext = file_name.rsplit_once('.').map(|(_, e)| e).unwrap_or("none");
        ChatError::UnsupportedKind(format!("extension '{ext}' in '{file_name}'"))
    })
}

/// Extract plain text from raw file bytes
pub fn extract_text(data: &[u8], kind: DocumentKind) -> Result<String> {
    let text = match kind {
        DocumentKind::Pdf => pdf_extract::extract_text_from_mem(data)
            .map_err(|e| ChatError::Extraction(format!("PDF extraction failed: {e}")))?,
        DocumentKind::Markdown => strip_markdown(&decode_utf8(data)?),
        DocumentKind::PlainText => decode_utf8(data)?,
    };

    if text.trim().is_empty() {
        return Err(ChatError::Extraction("document contains no text".to_string()));
    }

    Ok(text)
}

fn decode_utf8(data: &[u8]) -> Result<String> {
    String::from_utf8(data.to_vec())
        .map_err(|_| ChatError::Extraction("file is not valid UTF-8".to_string()))
}

/// Remove structural Markdown markers while keeping the prose
fn strip_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_fence = false;

    for line in text.lines() {
        let trimmed = line.trim_start();

        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            out.push_str(line);
            out.push('\n');
            continue;
        }

        let stripped = trimmed
            .trim_start_matches('#')
            .trim_start_matches('>')
            .trim_start();
        out.push_str(&strip_inline(stripped));
        out.push('\n');
    }

    out
}

/// Drop inline emphasis and backticks; rewrite `[text](url)` to `text`
fn strip_inline(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '`' | '*' => {}
            '[' => {
                let mut label = String::new();
                let mut closed = false;
                for lc in chars.by_ref() {
                    if lc == ']' {
                        closed = true;
                        break;
                    }
                    label.push(lc);
                }
                out.push_str(&label);
                if closed && chars.peek() == Some(&'(') {
                    // discard the URL part
                    for uc in chars.by_ref() {
                        if uc == ')' {
                            break;
                        }
                    }
                }
            }
            _ => out.push(c),
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_kind() {
        assert_eq!(detect_kind("report.pdf").unwrap(), DocumentKind::Pdf);
        assert_eq!(detect_kind("notes.md").unwrap(), DocumentKind::Markdown);
        assert_eq!(detect_kind("log.txt").unwrap(), DocumentKind::PlainText);
        assert!(matches!(
            detect_kind("deck.pptx"),
            Err(ChatError::UnsupportedKind(_))
        ));
        assert!(matches!(
            detect_kind("README"),
            Err(ChatError::UnsupportedKind(_))
        ));
    }

    #[test]
    fn test_plain_text_roundtrip() {
        let text = extract_text(b"hello world", DocumentKind::PlainText).unwrap();
        assert_eq!(text, "hello world");
    }

    #[test]
    fn test_empty_document_rejected() {
        assert!(matches!(
            extract_text(b"   \n ", DocumentKind::PlainText),
            Err(ChatError::Extraction(_))
        ));
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        assert!(matches!(
            extract_text(&[0xff, 0xfe, 0x00], DocumentKind::PlainText),
            Err(ChatError::Extraction(_))
        ));
    }

    #[test]
    fn test_markdown_stripping() {
        let md = "# Title\n\nSome *bold* text with a [link](https://example.com).\n";
        let text = extract_text(md.as_bytes(), DocumentKind::Markdown).unwrap();
        assert!(text.contains("Title"));
        assert!(text.contains("Some bold text with a link."));
        assert!(!text.contains('#'));
        assert!(!text.contains("https://example.com"));
    }

    #[test]
    fn test_markdown_keeps_fenced_code_content() {
        let md = "Intro.\n\n```\nlet x = 1;\n```\n";
        let text = extract_text(md.as_bytes(), DocumentKind::Markdown).unwrap();
        assert!(text.contains("let x = 1;"));
        assert!(!text.contains("```"));
    }
}
