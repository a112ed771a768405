// Display helpers shared by renderers

const BYTE_UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Human readable size with at most two decimals, e.g. `1.5 KB`
pub fn format_bytes(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    let rounded = (value * 100.0).round() / 100.0;
    let text = format!("{:.2}", rounded);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    format!("{} {}", text, BYTE_UNITS[unit])
}

/// Size in MB with two decimals, as listed next to artifacts
pub fn format_megabytes(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / 1024.0 / 1024.0)
}

/// Keep the first and last four characters of a secret
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}{}", head, "*".repeat(chars.len() - 8), tail)
}
