//! Text normalization for capability content matching.
//!
//! NFC first, then CRLF and lone CR collapse to LF. The normalized form is
//! matched against and then dropped; file hashes always reflect raw bytes.

use unicode_normalization::UnicodeNormalization;

pub fn normalize_content(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    let nfc: String = text.nfc().collect();

    let mut out = String::with_capacity(nfc.len());
    let mut chars = nfc.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\r' {
            if chars.peek() == Some(&'\n') {
                chars.next();
            }
            out.push('\n');
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crlf_and_lone_cr_become_lf() {
        assert_eq!(normalize_content(b"a\r\nb\rc\n"), "a\nb\nc\n");
    }

    #[test]
    fn nfc_composes_combining_sequences() {
        // "e" + COMBINING ACUTE ACCENT composes to U+00E9.
        let decomposed = "e\u{0301}".as_bytes();
        assert_eq!(normalize_content(decomposed), "\u{00e9}");
    }

    #[test]
    fn invalid_utf8_is_replaced_not_fatal() {
        let out = normalize_content(&[0x66, 0xff, 0x6f]);
        assert!(out.contains('f'));
        assert!(out.contains('\u{fffd}'));
    }
}
