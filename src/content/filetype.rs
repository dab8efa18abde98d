//! Content type sniffing from magic bytes
//!
//! The leaf only calls this on bytes it already read for hashing, so a file
//! is never opened just to learn its type. Files that were not hashed get
//! no content type.

/// Detect the MIME type from the leading bytes of a file
///
/// # Example
///
/// ```
/// use share_inventory::content::filetype::sniff_content_type;
///
/// let png_header = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
/// assert_eq!(sniff_content_type(png_header), Some("image/png".to_string()));
/// assert_eq!(sniff_content_type(b"plain words"), None);
/// ```
pub fn sniff_content_type(content: &[u8]) -> Option<String> {
    infer::get(content).map(|kind| kind.mime_type().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_pdf() {
        assert_eq!(
            sniff_content_type(b"%PDF-1.5\n%"),
            Some("application/pdf".to_string())
        );
    }

    #[test]
    fn test_detect_zip() {
        let zip_header = &[0x50, 0x4B, 0x03, 0x04];
        assert_eq!(
            sniff_content_type(zip_header),
            Some("application/zip".to_string())
        );
    }

    #[test]
    fn test_unknown_and_empty() {
        assert_eq!(sniff_content_type(&[0x00, 0x01, 0x02, 0x03]), None);
        assert_eq!(sniff_content_type(&[]), None);
    }
}
