/// Returns the index of the first occurrence of `needle` in `haystack`.
pub fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Splits `haystack` on every occurrence of `needle`, returning the pieces
/// between occurrences (excluding the needle itself).
pub fn split_on<'a>(haystack: &'a [u8], needle: &[u8]) -> Vec<&'a [u8]> {
    let mut result = Vec::new();
    let mut start = 0;
    while start <= haystack.len() {
        if let Some(pos) = find_subsequence(&haystack[start..], needle) {
            result.push(&haystack[start..start + pos]);
            start += pos + needle.len();
        } else {
            result.push(&haystack[start..]);
            break;
        }
    }
    result
}

/// Extracts the boundary token from a Content-Type header value like
/// `multipart/form-data; boundary=----WebKitFormBoundaryXXX`.
pub fn extract_boundary(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .map(|s| s.trim())
        .find(|s| s.starts_with("boundary="))
        .map(|s| s["boundary=".len()..].trim_matches('"').to_owned())
        .filter(|b| !b.is_empty())
}

/// Raw bytes of the file part named `field_name`.
///
/// Returns `None` when the part is missing. A browser submits an empty part
/// when no file was chosen; that comes back as `Some(vec![])`.
pub fn extract_file(body: &[u8], boundary: &str, field_name: &str) -> Option<Vec<u8>> {
    let delimiter = format!("--{}", boundary);
    let sep = b"\r\n\r\n";

    for part in split_on(body, delimiter.as_bytes()) {
        let sep_pos = match find_subsequence(part, sep) {
            Some(pos) => pos,
            None => continue,
        };
        let headers = String::from_utf8_lossy(&part[..sep_pos]);
        let has_name = headers.contains(&format!("name=\"{}\"", field_name));
        if has_name && headers.contains("filename=") {
            let raw = &part[sep_pos + sep.len()..];
            let trimmed = raw.strip_suffix(b"\r\n").unwrap_or(raw);
            return Some(trimmed.to_vec());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(boundary: &str, payload: &[u8]) -> Vec<u8> {
        let mut b = Vec::new();
        b.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        b.extend_from_slice(b"Content-Disposition: form-data; name=\"image\"; filename=\"leaf.png\"\r\n");
        b.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
        b.extend_from_slice(payload);
        b.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
        b
    }

    #[test]
    fn boundary_is_parsed_from_content_type() {
        assert_eq!(
            extract_boundary("multipart/form-data; boundary=----abc123").as_deref(),
            Some("----abc123")
        );
        assert_eq!(extract_boundary("multipart/form-data; boundary=\"q\"").as_deref(), Some("q"));
        assert_eq!(extract_boundary("application/x-www-form-urlencoded"), None);
    }

    #[test]
    fn file_bytes_survive_binary_content() {
        let payload = [0x89, b'P', b'N', b'G', 0x00, b'\r', b'\n', 0xff];
        let b = body("XyZ", &payload);
        assert_eq!(extract_file(&b, "XyZ", "image"), Some(payload.to_vec()));
        assert_eq!(extract_file(&b, "XyZ", "other"), None);
    }

    #[test]
    fn empty_file_part_is_empty_not_missing() {
        let b = body("XyZ", b"");
        assert_eq!(extract_file(&b, "XyZ", "image"), Some(Vec::new()));
    }
}
