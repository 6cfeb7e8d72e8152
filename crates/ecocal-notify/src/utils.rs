use serde_json::Value;

/// Longest provider response body kept in an error message.
pub const MAX_BODY_LENGTH: usize = 2000;

/// Key fragments that mark a config value as secret.
const SECRET_MARKERS: [&str; 5] = ["token", "secret", "password", "api_key", "apikey"];

/// Cuts `s` to at most `max_len` bytes on a char boundary.
pub fn truncate_body(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... [truncated]", &s[..end])
}

/// Copy of `config` with every secret-looking value replaced by `"***"`.
pub fn redact_secrets(config: &Value) -> Value {
    let mut out = config.clone();
    mask_in_place(&mut out);
    out
}

fn mask_in_place(value: &mut Value) {
    match value {
        Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                let key = key.to_ascii_lowercase();
                if SECRET_MARKERS.iter().any(|m| key.contains(m)) {
                    *val = Value::String("***".into());
                } else {
                    mask_in_place(val);
                }
            }
        }
        Value::Array(items) => items.iter_mut().for_each(mask_in_place),
        _ => {}
    }
}
