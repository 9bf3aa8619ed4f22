//! `file://` URL parsing (§6). Non-file URLs are rejected; Windows drive
//! letters (`file:///C:/x`, `file:///c:/x`) are recognized and normalized
//! to an uppercase-drive `C:/x` form.

use std::path::PathBuf;

use crate::error::{ResolveError, Result};

/// Parse a `file://` URL into a filesystem path.
pub fn parse_file_url(input: &str) -> Result<PathBuf> {
    let parsed = url::Url::parse(input).map_err(|e| invalid(input, e.to_string()))?;
    if parsed.scheme() != "file" {
        return Err(invalid(input, "only file:// URLs are supported".to_string()));
    }

    let decoded = percent_encoding::percent_decode_str(parsed.path())
        .decode_utf8()
        .map_err(|e| invalid(input, e.to_string()))?
        .into_owned();

    let trimmed = decoded.trim_start_matches('/');
    let bytes = trimmed.as_bytes();
    let is_windows_drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';

    if is_windows_drive {
        let mut chars: Vec<char> = trimmed.chars().collect();
        chars[0] = chars[0].to_ascii_uppercase();
        Ok(PathBuf::from(chars.into_iter().collect::<String>()))
    } else {
        Ok(PathBuf::from(decoded))
    }
}

fn invalid(url: &str, message: String) -> ResolveError {
    ResolveError::InvalidFileUrl {
        url: url.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unix_path() {
        let p = parse_file_url("file:///unix/path").unwrap();
        assert_eq!(p, PathBuf::from("/unix/path"));
    }

    #[test]
    fn windows_drive_uppercased() {
        assert_eq!(parse_file_url("file:///C:/x").unwrap(), PathBuf::from("C:/x"));
        assert_eq!(parse_file_url("file:///c:/x").unwrap(), PathBuf::from("C:/x"));
    }

    #[test]
    fn non_file_scheme_rejected() {
        assert!(parse_file_url("https://example.com/x").is_err());
    }

    #[test]
    fn malformed_url_rejected() {
        assert!(parse_file_url("not a url").is_err());
    }
}
