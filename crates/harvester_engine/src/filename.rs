use chrono::{DateTime, TimeZone};

const DEFAULT_PREFIX: &str = "dealapp";

/// `{prefix}_{YYYYmmdd_HHMMSS}.{extension}`, safe on every common filesystem.
pub fn run_filename<Tz: TimeZone>(prefix: &str, at: &DateTime<Tz>, extension: &str) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let prefix = sanitize_prefix(prefix);
    let stamp = at.format("%Y%m%d_%H%M%S");
    format!("{prefix}_{stamp}.{extension}")
}

fn sanitize_prefix(input: &str) -> String {
    let mut compacted = String::with_capacity(input.len());
    let mut prev_underscore = false;
    for c in input.chars() {
        let c = if is_forbidden(c) || c.is_whitespace() { '_' } else { c };
        if c == '_' && prev_underscore {
            continue;
        }
        prev_underscore = c == '_';
        compacted.push(c);
    }
    let trimmed = compacted.trim_matches(&['_', '.'][..]);
    if trimmed.is_empty() {
        return DEFAULT_PREFIX.to_string();
    }
    let mut name: String = trimmed.chars().take(60).collect();
    if is_reserved_windows_name(&name) {
        name.push('_');
    }
    name
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn at() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3 * 3600)
            .unwrap()
            .with_ymd_and_hms(2024, 3, 9, 7, 5, 1)
            .unwrap()
    }

    #[test]
    fn stamps_prefix_with_local_time() {
        assert_eq!(run_filename("dealapp", &at(), "csv"), "dealapp_20240309_070501.csv");
    }

    #[test]
    fn replaces_path_separators_and_spaces() {
        assert_eq!(
            run_filename("riyadh / sale", &at(), "json"),
            "riyadh_sale_20240309_070501.json"
        );
    }

    #[test]
    fn empty_or_reserved_prefixes_stay_usable() {
        assert_eq!(run_filename("..", &at(), "csv"), "dealapp_20240309_070501.csv");
        assert_eq!(run_filename("nul", &at(), "csv"), "nul__20240309_070501.csv");
    }
}
