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
        match find_subsequence(&haystack[start..], needle) {
            Some(pos) => {
                result.push(&haystack[start..start + pos]);
                start += pos + needle.len();
            }
            None => {
                result.push(&haystack[start..]);
                break;
            }
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

/// An uploaded file part.
#[derive(Debug, Clone, PartialEq)]
pub struct FilePart {
    pub filename:     String,
    /// The part's own `Content-Type`, empty if the client sent none.
    pub content_type: String,
    pub data:         Vec<u8>,
}

/// Finds the file part whose form field is named `field_name`.
pub fn extract_file_part(body: &[u8], boundary: &str, field_name: &str) -> Option<FilePart> {
    let delimiter = format!("--{}", boundary);
    let sep = b"\r\n\r\n";

    for part in split_on(body, delimiter.as_bytes()) {
        let Some(sep_pos) = find_subsequence(part, sep) else { continue };
        let headers = PartHeaders::parse(&String::from_utf8_lossy(&part[..sep_pos]));

        if headers.name.as_deref() != Some(field_name) {
            continue;
        }
        let Some(filename) = headers.filename else { continue };

        let raw = &part[sep_pos + sep.len()..];
        let data = raw.strip_suffix(b"\r\n").unwrap_or(raw);
        return Some(FilePart {
            filename,
            content_type: headers.content_type.unwrap_or_default(),
            data: data.to_vec(),
        });
    }
    None
}

#[derive(Debug, Default)]
struct PartHeaders {
    name:         Option<String>,
    filename:     Option<String>,
    content_type: Option<String>,
}

impl PartHeaders {
    fn parse(section: &str) -> PartHeaders {
        let mut headers = PartHeaders::default();
        for line in section.split("\r\n") {
            let Some((key, value)) = line.split_once(':') else { continue };
            let key = key.trim();
            if key.eq_ignore_ascii_case("Content-Disposition") {
                for param in value.split(';').skip(1) {
                    let Some((k, v)) = param.split_once('=') else { continue };
                    let v = v.trim().trim_matches('"').to_owned();
                    match k.trim().to_ascii_lowercase().as_str() {
                        "name"     => headers.name = Some(v),
                        "filename" => headers.filename = Some(v),
                        _ => {}
                    }
                }
            } else if key.eq_ignore_ascii_case("Content-Type") {
                headers.content_type = Some(value.trim().to_owned());
            }
        }
        headers
    }
}

/// Keeps ASCII alphanumerics, `.`, `-` and `_`; everything else becomes `_`.
/// Leading dots are dropped so the result never names a hidden file or `..`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(name);
    let cleaned: String = base.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() { "upload".to_owned() } else { trimmed.to_owned() }
}
