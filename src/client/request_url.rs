//! Request URL construction.

use super::ClientError;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use url::Url;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"\{([^{}]+)\}").expect("path placeholder pattern is valid")
});

/// String form used for path and query values: strings as-is, everything
/// else as JSON text.
pub fn value_to_param(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Names of the `{placeholders}` in a path template, in order.
pub fn path_placeholders(template: &str) -> Vec<&str> {
    PLACEHOLDER
        .captures_iter(template)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect()
}

/// Build the absolute URL for one call.
///
/// Every `{name}` in `path_template` is replaced by the percent-encoded
/// value from `path_params`. Query values that are `null` are omitted,
/// arrays become repeated `key=value` pairs, and scalars replace any pair
/// of the same name already present on `base_url`.
///
/// ```
/// use serde_json::json;
/// use specdeck::client::build_url;
///
/// let url = build_url(
///     "https://api.example.com/",
///     "/items/{id}",
///     json!({"id": "a b"}).as_object().unwrap(),
///     json!({"tag": ["x", "y"], "q": null}).as_object().unwrap(),
/// )
/// .unwrap();
/// assert_eq!(url, "https://api.example.com/items/a%20b?tag=x&tag=y");
/// ```
pub fn build_url(
    base_url: &str,
    path_template: &str,
    path_params: &Map<String, Value>,
    query: &Map<String, Value>,
) -> Result<String, ClientError> {
    let mut url = Url::parse(base_url.trim())
        .ok()
        .filter(|u| u.has_host())
        .ok_or_else(|| ClientError::InvalidUrl(base_url.to_string()))?;

    let path = PLACEHOLDER.replace_all(path_template, |caps: &Captures| {
        match path_params.get(&caps[1]).filter(|v| !v.is_null()) {
            Some(value) => urlencoding::encode(&value_to_param(value)).into_owned(),
            None => caps[0].to_string(),
        }
    });
    let path = if path.starts_with('/') {
        path.into_owned()
    } else {
        format!("/{path}")
    };
    let joined = format!("{}{}", url.path().trim_end_matches('/'), path);

    let mut pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    for (key, value) in query {
        match value {
            Value::Null => {}
            Value::Array(items) => pairs.extend(
                items
                    .iter()
                    .filter(|v| !v.is_null())
                    .map(|v| (key.clone(), value_to_param(v))),
            ),
            scalar => {
                // Replaces the first same-named pair in place and drops the rest.
                let value = value_to_param(scalar);
                match pairs.iter().position(|(k, _)| k == key) {
                    Some(first) => {
                        pairs[first].1 = value;
                        let mut index = 0;
                        pairs.retain(|(k, _)| {
                            let keep = k != key || index == first;
                            index += 1;
                            keep
                        });
                    }
                    None => pairs.push((key.clone(), value)),
                }
            }
        }
    }

    url.set_path(&joined);
    if pairs.is_empty() {
        url.set_query(None);
    } else {
        let encoded = pairs
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&encoded));
    }
    Ok(url.into())
}
