//! Image payload encoding for table display.

use base64::Engine;

use crate::models::FlattenedRow;

/// Column holding the base64 image data.
pub const IMAGE_B64_COLUMN: &str = "image_b64";

/// Column holding the HTML-embeddable form of the image.
pub const IMAGE_HTML_COLUMN: &str = "image_html";

/// Base64-encode raw image bytes.
pub fn encode_image(raw: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(raw)
}

/// Wrap a base64 JPEG in an `<img>` tag with a data URI.
pub fn image_html(b64: &str) -> String {
    format!("<img src='data:image/jpeg;base64,{}'/>", b64)
}

/// Row for one fetched image: the base64 payload and its HTML form.
pub fn image_row(raw: &[u8]) -> FlattenedRow {
    let b64 = encode_image(raw);
    let html = image_html(&b64);
    let mut row = FlattenedRow::new();
    row.insert(IMAGE_B64_COLUMN, b64);
    row.insert(IMAGE_HTML_COLUMN, html);
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_image() {
        assert_eq!(encode_image(b"\xff\xd8\xff"), "/9j/");
    }

    #[test]
    fn test_image_html() {
        assert_eq!(
            image_html("abc="),
            "<img src='data:image/jpeg;base64,abc='/>"
        );
    }

    #[test]
    fn test_image_row_has_two_matching_columns() {
        let row = image_row(b"jpeg-bytes");
        assert_eq!(row.len(), 2);
        let b64 = row.get(IMAGE_B64_COLUMN).unwrap();
        assert!(!b64.is_empty());
        assert_eq!(row.get(IMAGE_HTML_COLUMN).unwrap(), image_html(b64));
    }
}
