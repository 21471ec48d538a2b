use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

static URL_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"(?i)(https?://\S+|www\.\S+)").ok());
static MENTION_RE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"@\w+").ok());

/// Cleans a provider title for display and for use inside file names.
///
/// Removes links and `@mentions`, replaces `@<>:"/\|?*` with `_` and collapses
/// runs of whitespace.
///
/// # Example
///
/// ```
/// use vidrelay::core::utils::sanitize_title;
///
/// assert_eq!(sanitize_title("Live  at <Home> https://x.io @band"), "Live at _Home_");
/// ```
pub fn sanitize_title(raw: &str) -> String {
    let mut text = raw.to_string();
    if let Some(re) = URL_RE.as_ref() {
        text = re.replace_all(&text, " ").into_owned();
    }
    if let Some(re) = MENTION_RE.as_ref() {
        text = re.replace_all(&text, " ").into_owned();
    }

    let replaced: String = text
        .chars()
        .map(|c| match c {
            '@' | '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();

    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Formats a size given in megabytes the way format buttons show it.
///
/// ```
/// use vidrelay::core::utils::format_megabytes;
///
/// assert_eq!(format_megabytes(12.346), "12.35 MB");
/// ```
pub fn format_megabytes(mb: f64) -> String {
    format!("{:.2} MB", mb)
}

/// Megabytes from a byte count.
pub fn bytes_to_megabytes(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// Parses a stored approximate size ("12.34 MB", "850 KB", "1.2 GB") back into megabytes.
///
/// Returns `None` for anything it does not recognise; sizes are advisory.
pub fn parse_size_megabytes(label: &str) -> Option<f64> {
    let label = label.trim();
    let split = label
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(label.len());
    let (number, unit) = label.split_at(split);
    let value: f64 = number.parse().ok()?;

    match unit.trim().to_ascii_uppercase().as_str() {
        "" | "MB" | "MIB" => Some(value),
        "KB" | "KIB" => Some(value / 1024.0),
        "GB" | "GIB" => Some(value * 1024.0),
        _ => None,
    }
}

/// True when an advertised size label is known to exceed `limit_bytes`.
///
/// Missing or unparseable labels never count as too large.
pub fn exceeds_limit(approx_size: Option<&str>, limit_bytes: u64) -> bool {
    approx_size
        .and_then(parse_size_megabytes)
        .is_some_and(|mb| mb > bytes_to_megabytes(limit_bytes))
}

/// Upload ceiling as shown to users: "2 ГБ", "1.5 ГБ", "50 МБ".
pub fn format_size_limit(limit_bytes: u64) -> String {
    let mb = bytes_to_megabytes(limit_bytes);
    let (value, unit) = if mb >= 1024.0 { (mb / 1024.0, "ГБ") } else { (mb, "МБ") };
    let value = format!("{:.1}", value);
    format!("{} {}", value.strip_suffix(".0").unwrap_or(&value), unit)
}

/// Width parsed from the leading digits of a resolution label.
///
/// "1920x1080" gives 1920; "audio", "" and a missing label give 0.
pub fn resolution_width(label: Option<&str>) -> u32 {
    let Some(label) = label else { return 0 };
    let digits: String = label.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

/// Formats seconds as `M:SS` or `H:MM:SS`.
pub fn format_duration(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Turns the provider's `YYYYMMDD` upload date into `DD.MM.YYYY`.
///
/// Unknown layouts are returned unchanged.
pub fn format_upload_date(raw: &str) -> String {
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .map(|d| d.format("%d.%m.%Y").to_string())
        .unwrap_or_else(|_| raw.to_string())
}

/// Human-readable subscriber/view count ("1.2M", "35K").
pub fn format_count(count: u64) -> String {
    match count {
        c if c >= 1_000_000 => format!("{:.1}M", c as f64 / 1_000_000.0),
        c if c >= 1_000 => format!("{}K", c / 1_000),
        c => c.to_string(),
    }
}
