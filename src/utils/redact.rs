use serde_json::Value as JsonValue;

const REDACTED: &str = "[REDACTED]";

/// Masks credentials and session material before a payload is logged.
pub fn redact_sensitive_data(data: &JsonValue) -> JsonValue {
    match data {
        JsonValue::Object(map) => {
            let mut redacted_map = serde_json::Map::new();
            for (key, val) in map {
                let redacted_val = if is_sensitive_field(key) {
                    redact_scalar(val)
                } else {
                    redact_sensitive_data(val)
                };
                redacted_map.insert(key.clone(), redacted_val);
            }
            JsonValue::Object(redacted_map)
        }
        JsonValue::Array(items) => JsonValue::Array(items.iter().map(redact_sensitive_data).collect()),
        _ => data.clone(),
    }
}

fn is_sensitive_field(field_name: &str) -> bool {
    let lower = field_name.to_ascii_lowercase();
    matches!(
        lower.as_str(),
        "password" | "passwd" | "pwd" | "cookie" | "set-cookie" | "authorization"
    ) || lower.contains("token")
        || lower.contains("apikey")
        || lower.contains("api_key")
        || lower.contains("secret")
        || lower.contains("session")
}

fn redact_scalar(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::String(s) if !s.is_empty() => JsonValue::String(REDACTED.to_string()),
        JsonValue::Number(_) => JsonValue::String(REDACTED.to_string()),
        JsonValue::Object(_) | JsonValue::Array(_) => JsonValue::String(REDACTED.to_string()),
        _ => value.clone(),
    }
}

/// Credential-free form of a URL for log fields.
pub fn redact_url(url: &str) -> String {
    let without_query = url.split('?').next().unwrap_or(url);
    match without_query.split_once("://") {
        Some((scheme, rest)) => match rest.split_once('@') {
            Some((_, host)) => format!("{scheme}://{REDACTED}@{host}"),
            None => without_query.to_string(),
        },
        None => without_query.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn credentials_are_masked() {
        let data = json!({
            "username": "site.engineer",
            "password": "hunter2",
            "sessionId": "abc",
            "apiKey": "sk-test",
            "recordLimit": 1000
        });

        let redacted = redact_sensitive_data(&data);

        assert_eq!(redacted["username"], "site.engineer");
        assert_eq!(redacted["password"], REDACTED);
        assert_eq!(redacted["sessionId"], REDACTED);
        assert_eq!(redacted["apiKey"], REDACTED);
        assert_eq!(redacted["recordLimit"], 1000);
    }

    #[test]
    fn nested_headers_are_masked() {
        let data = json!({
            "headers": [{ "Authorization": "Bearer x", "accept": "application/json" }]
        });
        let redacted = redact_sensitive_data(&data);
        assert_eq!(redacted["headers"][0]["Authorization"], REDACTED);
        assert_eq!(redacted["headers"][0]["accept"], "application/json");
    }

    #[test]
    fn urls_lose_userinfo_and_query() {
        assert_eq!(
            redact_url("https://user:pw@dms.example.com/api/login?token=1"),
            "https://[REDACTED]@dms.example.com/api/login"
        );
        assert_eq!(redact_url("https://dms.example.com/a?b=c"), "https://dms.example.com/a");
    }
}
