use serde::{Deserialize, Serialize};

/// Identifiers that travelled through a numeric encoding upstream show up as
/// `"123.0"`. Strip that back to `"123"`; anything else is only trimmed.
pub fn normalize_id(raw: &str) -> String {
    let trimmed = raw.trim();
    let Some(integral) = trimmed.strip_suffix(".0") else {
        return trimmed.to_string();
    };

    let digits = integral.strip_prefix('-').unwrap_or(integral);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        // "-0.0" truncates to zero, not to "-0"
        if digits.bytes().all(|b| b == b'0') {
            return "0".to_string();
        }
        let unpadded = digits.trim_start_matches('0');
        return if integral.starts_with('-') {
            format!("-{unpadded}")
        } else {
            unpadded.to_string()
        };
    }

    match trimmed.parse::<f64>() {
        Ok(value) => render_integral(value).unwrap_or_else(|| trimmed.to_string()),
        Err(_) => trimmed.to_string(),
    }
}

/// Truncates a float to an integer string when it fits an `i64`.
fn render_integral(value: f64) -> Option<String> {
    if !value.is_finite() {
        return None;
    }
    let truncated = value.trunc();
    if truncated.abs() >= i64::MAX as f64 {
        return None;
    }
    Some((truncated as i64).to_string())
}

/// An identifier as it arrives in a JSON body: storefront scripts send store
/// and cart ids as numbers, while other clients send strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl RawId {
    pub fn normalize(&self) -> String {
        match self {
            RawId::Integer(value) => value.to_string(),
            RawId::Float(value) if value.fract() == 0.0 => {
                render_integral(*value).unwrap_or_else(|| value.to_string())
            }
            RawId::Float(value) => normalize_id(&value.to_string()),
            RawId::Text(text) => normalize_id(text),
        }
    }
}

/// Missing and `null` identifiers normalize to the empty string.
pub fn normalize_optional(raw: Option<&RawId>) -> String {
    raw.map(RawId::normalize).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_float_suffix() {
        assert_eq!(normalize_id("123.0"), "123");
        assert_eq!(normalize_id("  77.0 "), "77");
        assert_eq!(normalize_id("-5.0"), "-5");
        assert_eq!(normalize_id("-0.0"), "0");
        assert_eq!(normalize_id("007.0"), "7");
    }

    #[test]
    fn trims_plain_identifiers() {
        assert_eq!(normalize_id(" 45 "), "45");
        assert_eq!(normalize_id("abc"), "abc");
        assert_eq!(normalize_id("1.50"), "1.50");
        assert_eq!(normalize_id(""), "");
    }

    #[test]
    fn keeps_unparseable_suffixed_strings() {
        assert_eq!(normalize_id("abc.0"), "abc.0");
        assert_eq!(normalize_id(".0"), "0");
    }

    #[test]
    fn long_numeric_ids_keep_precision() {
        assert_eq!(
            normalize_id("123456789012345678901234.0"),
            "123456789012345678901234"
        );
    }

    #[test]
    fn float_path_handles_exponents() {
        assert_eq!(normalize_id("1e3.0"), "1e3.0");
        assert_eq!(normalize_id("+12.0"), "12");
    }

    #[test]
    fn raw_ids_from_json() {
        let ids: Vec<RawId> = serde_json::from_str(r#"[123, 123.0, " 9.0 ", "abc"]"#).unwrap();
        let normalized: Vec<String> = ids.iter().map(RawId::normalize).collect();
        assert_eq!(normalized, vec!["123", "123", "9", "abc"]);
    }

    #[test]
    fn missing_id_is_empty() {
        assert_eq!(normalize_optional(None), "");
        let parsed: Option<RawId> = serde_json::from_str("null").unwrap();
        assert_eq!(normalize_optional(parsed.as_ref()), "");
    }
}
