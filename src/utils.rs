/// Formats an observer location, e.g. `54.0000N 19.0000E 123m`.
///
/// A zero altitude is omitted.
pub fn coords(lat: f64, lon: f64, alt: Option<f64>) -> String {
    let mut txt = format!(
        "{:.4}{} {:.4}{}",
        lat.abs(),
        if lat > 0.0 { "N" } else { "S" },
        lon.abs(),
        if lon > 0.0 { "E" } else { "W" },
    );
    if let Some(alt) = alt.filter(|a| *a != 0.0) {
        txt.push_str(&format!(" {:2.0}m", alt));
    }
    txt
}

fn is_safe_filename_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '.' | '-' | '_')
}

/// Replaces every character that is unsafe in a filename with `replacement`.
pub fn safe_filename(name: &str, replacement: char) -> String {
    name.chars()
        .map(|c| if is_safe_filename_char(c) { c } else { replacement })
        .collect()
}

/// Cache filename for a TLE source URL: scheme dropped, unsafe characters
/// replaced by `-`, lowercased.
pub fn url_to_filename(url: &str) -> String {
    let without_scheme = url.find("//").map(|i| &url[i + 2..]).unwrap_or(url);
    safe_filename(without_scheme, '-').to_lowercase()
}
