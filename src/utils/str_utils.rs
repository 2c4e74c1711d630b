pub trait StringExtensions {
    /// Reduce an uploaded file name to something safe to put on disk.
    /// E.g. `"../My Photo (1).JPG".sanitize_filename() == "My-Photo-1-.JPG"`
    fn sanitize_filename(&self) -> String;
}

impl StringExtensions for str {
    fn sanitize_filename(&self) -> String {
        const FALLBACK_STEM: &str = "upload";

        let last_component = self.rsplit(['/', '\\']).next().unwrap_or_default();
        let (stem, extension) = match last_component.rsplit_once('.') {
            Some((stem, extension)) if !extension.is_empty() => (stem, Some(extension)),
            _ => (last_component, None),
        };
        let stem = sanitize_part(stem);
        let stem = if stem.is_empty() { FALLBACK_STEM } else { stem.as_str() };
        match extension.map(sanitize_part).filter(|x| !x.is_empty()) {
            Some(extension) => format!("{}.{}", stem, extension),
            None => stem.to_string(),
        }
    }
}

fn sanitize_part(part: &str) -> String {
    let mut sanitized = String::with_capacity(part.len());
    for c in part.chars() {
        let keep = c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-';
        let c = if keep { c } else { '-' };
        if c == '-' && sanitized.ends_with('-') {
            continue;
        }
        sanitized.push(c);
    }
    sanitized.trim_start_matches(['.', '-']).to_string()
}

#[test]
fn test_sanitize_filename() {
    assert_eq!("sunset.jpg".sanitize_filename(), "sunset.jpg");
    assert_eq!("../My Photo (1).JPG".sanitize_filename(), "My-Photo-1-.JPG");
    assert_eq!("C:\\Users\\me\\cat.png".sanitize_filename(), "cat.png");
    assert_eq!("..".sanitize_filename(), "upload");
    assert_eq!("".sanitize_filename(), "upload");
    assert_eq!("фото.png".sanitize_filename(), "upload.png");
    assert_eq!("архив.tar.gz".sanitize_filename(), "tar.gz");
    assert_eq!("README".sanitize_filename(), "README");
}
