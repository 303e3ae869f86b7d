//! Destination key derivation.
//!
//! Keys are a persisted contract: `<source-key-stem>/frame-<ordinal
//! zero-padded to 4>.<ext>`, derived only from the source descriptor
//! and the frame ordinal. Re-processing a source therefore rewrites
//! the same keys, which is what makes at-least-once delivery safe.

use fsplit_media::FrameEncoding;

/// Derive the destination key for one frame of a source object.
pub fn frame_key(source_key: &str, ordinal: u32, encoding: FrameEncoding) -> String {
    format!(
        "{}/frame-{:04}.{}",
        key_stem(source_key),
        ordinal,
        encoding.extension()
    )
}

/// Strip the extension from the final path segment of a key.
fn key_stem(key: &str) -> &str {
    let file_start = key.rfind('/').map(|i| i + 1).unwrap_or(0);
    match key[file_start..].rfind('.') {
        Some(dot) => &key[..file_start + dot],
        None => key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_key_format() {
        assert_eq!(
            frame_key("games/2024-01-01.mp4", 0, FrameEncoding::Jpeg),
            "games/2024-01-01/frame-0000.jpg"
        );
        assert_eq!(
            frame_key("games/2024-01-01.mp4", 2, FrameEncoding::Jpeg),
            "games/2024-01-01/frame-0002.jpg"
        );
    }

    #[test]
    fn test_frame_key_is_deterministic() {
        let a = frame_key("match.mov", 17, FrameEncoding::Jpeg);
        let b = frame_key("match.mov", 17, FrameEncoding::Jpeg);
        assert_eq!(a, b);
        assert_eq!(a, "match/frame-0017.jpg");
    }

    #[test]
    fn test_key_stem_with_dotted_directory() {
        // a dot in a directory segment is not an extension
        assert_eq!(key_stem("2024.01/match"), "2024.01/match");
        assert_eq!(key_stem("2024.01/match.mp4"), "2024.01/match");
    }

    #[test]
    fn test_key_stem_without_extension() {
        assert_eq!(key_stem("rawvideo"), "rawvideo");
    }

    #[test]
    fn test_padding_beyond_four_digits() {
        assert_eq!(
            frame_key("long.mp4", 123456, FrameEncoding::Jpeg),
            "long/frame-123456.jpg"
        );
    }
}
