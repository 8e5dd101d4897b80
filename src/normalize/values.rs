use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;
use url::Url;

/// Epoch values at or above this are read as milliseconds.
const MILLIS_CUTOFF: i64 = 100_000_000_000;

const SOCIAL_HOSTS: [&str; 4] = ["twitter.com", "x.com", "github.com", "linkedin.com"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ValueKind {
    Social,
    Email,
    Date,
    Url,
    Plain,
}

fn kind_for(key: &str) -> ValueKind {
    let lower = key.to_ascii_lowercase();
    let has = |needle: &str| lower.contains(needle);

    if has("twitter") || has("github") || has("linkedin") || lower == "x" {
        ValueKind::Social
    } else if has("email") {
        ValueKind::Email
    } else if lower.ends_with("_at") || key.ends_with("At") || has("date") || has("timestamp") {
        ValueKind::Date
    } else if has("url") || has("website") || has("homepage") || has("href") || has("link") {
        ValueKind::Url
    } else {
        ValueKind::Plain
    }
}

/// Rewrite leaf values in place according to the kind of the key that holds
/// them. Array elements inherit their parent's key; flattened keys are
/// judged by their last segment.
pub(super) fn normalize_values(value: &mut Value, key: Option<&str>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map.iter_mut() {
                let leaf = k.rsplit('.').next().unwrap_or(k);
                normalize_values(v, Some(leaf));
            }
        }
        Value::Array(items) => {
            for item in items {
                normalize_values(item, key);
            }
        }
        Value::String(s) => {
            let kind = key.map_or(ValueKind::Plain, kind_for);
            *s = normalize_string(kind, s);
        }
        Value::Number(n) => {
            if key.map(kind_for) == Some(ValueKind::Date) {
                if let Some(date) = n.as_i64().and_then(epoch_to_rfc3339) {
                    *value = Value::String(date);
                }
            }
        }
        Value::Null | Value::Bool(_) => {}
    }
}

fn normalize_string(kind: ValueKind, raw: &str) -> String {
    let trimmed = raw.trim();
    match kind {
        ValueKind::Social => social_handle(trimmed),
        ValueKind::Email => trimmed.to_lowercase(),
        ValueKind::Date => canonical_date(trimmed).unwrap_or_else(|| trimmed.to_string()),
        ValueKind::Url => canonical_url(trimmed).unwrap_or_else(|| trimmed.to_string()),
        ValueKind::Plain => trimmed.to_string(),
    }
}

/// Parsed and re-serialized http(s) URL without trailing slashes.
pub fn canonical_url(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    Some(url.as_str().trim_end_matches('/').to_string())
}

/// RFC 3339 UTC with millisecond precision, from RFC 3339, SQL-style
/// datetimes or plain dates.
pub fn canonical_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let parsed: DateTime<Utc> = if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        dt.with_timezone(&Utc)
    } else if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        dt.and_utc()
    } else if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        dt.and_utc()
    } else {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()?
            .and_hms_opt(0, 0, 0)?
            .and_utc()
    };
    Some(parsed.to_rfc3339_opts(SecondsFormat::Millis, true))
}

fn epoch_to_rfc3339(n: i64) -> Option<String> {
    let dt = if n.abs() >= MILLIS_CUTOFF {
        DateTime::from_timestamp_millis(n)?
    } else {
        DateTime::from_timestamp(n, 0)?
    };
    Some(dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Handle from a twitter/x/github/linkedin profile URL, or the input without
/// a leading `@`.
pub fn social_handle(raw: &str) -> String {
    let raw = raw.trim().trim_start_matches('@');
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else if SOCIAL_HOSTS
        .iter()
        .any(|h| raw.starts_with(h) || raw.starts_with(&format!("www.{h}")))
    {
        format!("https://{raw}")
    } else {
        return raw.to_string();
    };

    let Ok(url) = Url::parse(&candidate) else {
        return raw.to_string();
    };
    let host = url
        .host_str()
        .unwrap_or_default()
        .trim_start_matches("www.")
        .trim_start_matches("mobile.");
    if !SOCIAL_HOSTS.contains(&host) {
        return raw.to_string();
    }

    let mut segments = url.path_segments().into_iter().flatten().filter(|s| !s.is_empty());
    let first = segments.next();
    let handle = match (host, first) {
        ("linkedin.com", Some("in" | "company")) => segments.next(),
        (_, first) => first,
    };

    match handle {
        Some(h) => h.trim_start_matches('@').to_string(),
        None => raw.to_string(),
    }
}
