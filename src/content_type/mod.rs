//! Content-type detection for stored objects
//!
//! Priority: extension table, then magic bytes, then an `<svg` text
//! heuristic, then common image extensions, then `application/octet-stream`.

mod sniff;

pub use sniff::{sniff, SNIFF_LEN};

/// Generic binary fallback
pub const OCTET_STREAM: &str = "application/octet-stream";

const SVG: &str = "image/svg+xml";

/// How far into the content the `<svg` heuristic looks
pub const SVG_SCAN_LEN: usize = 1024;

/// Lowercased extension of the final path segment, without the dot
///
/// Segments are split on the platform's separators, so `\` is part of a
/// file name on Unix.
fn extension(name: &str) -> Option<String> {
    let file_name = name
        .rsplit(std::path::is_separator)
        .next()
        .unwrap_or(name);
    let dot = file_name.rfind('.')?;
    let ext = &file_name[dot + 1..];
    if ext.is_empty() {
        None
    } else {
        Some(ext.to_ascii_lowercase())
    }
}

/// Fix non-standard variants and prefer the SVG type for `.svg` files
fn normalize(content_type: &str, ext: Option<&str>) -> String {
    if content_type == "image/jpg" {
        return "image/jpeg".to_string();
    }
    let xml_family =
        content_type.starts_with("text/xml") || content_type.starts_with("application/xml");
    if xml_family && ext == Some("svg") {
        return SVG.to_string();
    }
    content_type.to_string()
}

/// Look up a content type from the object name's extension alone
pub fn from_extension(name: &str) -> Option<String> {
    let ext = extension(name)?;
    let content_type = mime_guess::from_ext(&ext).first_raw()?;
    Some(normalize(content_type, Some(&ext)))
}

/// Infer the content type of an object from its name and leading bytes
///
/// Never fails and never returns an empty string. Only the first
/// [`SVG_SCAN_LEN`] bytes of `data` are ever examined.
pub fn detect_content_type(name: &str, data: &[u8]) -> String {
    if let Some(content_type) = from_extension(name) {
        return content_type;
    }
    let ext = extension(name);

    if !data.is_empty() {
        let sniffed = sniff(data);
        if sniffed != OCTET_STREAM {
            return normalize(sniffed, ext.as_deref());
        }
    }

    let head = &data[..data.len().min(SVG_SCAN_LEN)];
    if head.to_ascii_lowercase().windows(4).any(|w| w == b"<svg") {
        return SVG.to_string();
    }

    let fallback = match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("avif") => "image/avif",
        Some("svg") => SVG,
        Some("ico") => "image/x-icon",
        _ => OCTET_STREAM,
    };
    fallback.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_parsing() {
        assert_eq!(extension("a.svg").as_deref(), Some("svg"));
        assert_eq!(extension("dir.v2/photo.JPG").as_deref(), Some("jpg"));
        assert_eq!(extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension("dir.v2/README"), None);
        assert_eq!(extension("trailing."), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_backslash_is_part_of_file_name() {
        assert_eq!(extension("dir.v2\\README").as_deref(), Some("v2\\readme"));
        assert_eq!(detect_content_type("dir.v2\\README", b"\x00\x01\x02"), OCTET_STREAM);
        assert_eq!(extension("scan\\page.PNG").as_deref(), Some("png"));
    }

    #[cfg(windows)]
    #[test]
    fn test_backslash_separates_segments() {
        assert_eq!(extension("dir.v2\\README"), None);
    }

    #[test]
    fn test_svg_by_extension() {
        let ct = detect_content_type("a.svg", b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>");
        assert_eq!(ct, SVG);
    }

    #[test]
    fn test_xml_type_for_svg_is_rewritten() {
        assert_eq!(normalize("text/xml; charset=utf-8", Some("svg")), SVG);
        assert_eq!(normalize("application/xml", Some("svg")), SVG);
        assert_eq!(normalize("text/xml", Some("xml")), "text/xml");
    }

    #[test]
    fn test_jpg_variant_is_rewritten() {
        assert_eq!(normalize("image/jpg", None), "image/jpeg");
    }

    #[test]
    fn test_jpeg_extension_any_case() {
        for name in ["photo.jpg", "photo.JPG", "photo.JpG", "photo.jpeg"] {
            assert_eq!(detect_content_type(name, b"not really a jpeg"), "image/jpeg");
        }
    }

    #[test]
    fn test_png_magic_without_extension() {
        let data = b"\x89PNG\x0D\x0A\x1A\x0A\x00\x00\x00\x0DIHDR";
        assert_eq!(detect_content_type("upload", data), "image/png");
    }

    #[test]
    fn test_unknown_everything_is_octet_stream() {
        let data = b"\x00\x02\x03\xFE\x10\x11";
        assert_eq!(detect_content_type("blob.zzqx", data), OCTET_STREAM);
        assert_eq!(detect_content_type("blob", b""), OCTET_STREAM);
    }

    #[test]
    fn test_svg_heuristic_in_binary_looking_data() {
        let data = b"\x01\x02<SVG width=\"10\"></svg>";
        assert_eq!(detect_content_type("drawing", data), SVG);
    }

    #[test]
    fn test_svg_heuristic_limited_to_scan_window() {
        let mut data = vec![0x01u8; SVG_SCAN_LEN];
        data.extend_from_slice(b"<svg>");
        assert_eq!(detect_content_type("drawing", &data), OCTET_STREAM);
    }

    #[test]
    fn test_plain_text_without_extension() {
        assert_eq!(
            detect_content_type("notes", b"hello world\n"),
            "text/plain; charset=utf-8"
        );
    }

    #[test]
    fn test_never_empty() {
        for (name, data) in [("", &b""[..]), (".", &b"\x00"[..]), ("x.", &b"\xFF"[..])] {
            assert!(!detect_content_type(name, data).is_empty());
        }
    }
}
