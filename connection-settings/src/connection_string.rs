//! `key=value;key=value` codec shared by the SQL and entity builders.
//!
//! Follows the ADO.NET rules: keys are case-insensitive and trimmed, values
//! that contain quotes, `=`, `;`, whitespace or control characters are
//! quoted on output, and quoted values use a doubled quote as the escape.

use crate::error::{SettingsError, SettingsResult};

/// Returns true when `value` must be quoted to survive a round trip.
pub fn needs_quoting(value: &str) -> bool {
    value
        .chars()
        .any(|c| matches!(c, '"' | '\'' | '=' | ';') || c.is_whitespace() || c.is_control())
}

/// Quotes a value the way `DbConnectionStringBuilder` does: single quotes
/// when the value contains a double quote but no single quote, otherwise
/// double quotes with embedded double quotes doubled.
pub fn quote_value(value: &str) -> String {
    if !needs_quoting(value) {
        return value.to_string();
    }
    if value.contains('"') && !value.contains('\'') {
        format!("'{}'", value)
    } else {
        format!("\"{}\"", value.replace('"', "\"\""))
    }
}

/// Appends `key=value` to `out`, separated from any previous pair by `;`.
pub fn append_pair(out: &mut String, key: &str, value: &str) {
    if !out.is_empty() {
        out.push(';');
    }
    out.push_str(key);
    out.push('=');
    out.push_str(&quote_value(value));
}

/// Normalises a keyword for lookup: lowercase with inner whitespace collapsed.
pub fn normalize_key(key: &str) -> String {
    key.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Splits a connection string into `(key, value)` pairs in source order.
///
/// Keys are returned trimmed but with their original casing. Empty segments
/// (`;;`) are skipped.
#[allow(clippy::indexing_slicing)]
pub fn parse_pairs(input: &str) -> SettingsResult<Vec<(String, String)>> {
    let chars: Vec<char> = input.chars().collect();
    let mut pairs = Vec::new();
    let mut pos = 0;

    loop {
        while pos < chars.len() && (chars[pos] == ';' || chars[pos].is_whitespace()) {
            pos += 1;
        }
        if pos >= chars.len() {
            break;
        }

        let key_start = pos;
        while pos < chars.len() && chars[pos] != '=' {
            if chars[pos] == ';' {
                return Err(SettingsError::InvalidFormat {
                    position: pos,
                    message: "expected '=' after keyword".to_string(),
                });
            }
            pos += 1;
        }
        if pos >= chars.len() {
            return Err(SettingsError::InvalidFormat {
                position: pos,
                message: "expected '=' after keyword".to_string(),
            });
        }
        let key: String = chars[key_start..pos].iter().collect::<String>().trim().to_string();
        if key.is_empty() {
            return Err(SettingsError::InvalidFormat {
                position: key_start,
                message: "empty keyword".to_string(),
            });
        }
        pos += 1;

        while pos < chars.len() && chars[pos] != ';' && chars[pos].is_whitespace() {
            pos += 1;
        }

        let value = match chars.get(pos) {
            Some(&quote) if quote == '"' || quote == '\'' => {
                let (value, next) = read_quoted(&chars, pos, quote)?;
                pos = next;
                while pos < chars.len() && chars[pos].is_whitespace() {
                    pos += 1;
                }
                if pos < chars.len() && chars[pos] != ';' {
                    return Err(SettingsError::InvalidFormat {
                        position: pos,
                        message: format!("unexpected character after quoted value for '{}'", key),
                    });
                }
                value
            }
            _ => {
                let value_start = pos;
                while pos < chars.len() && chars[pos] != ';' {
                    pos += 1;
                }
                chars[value_start..pos].iter().collect::<String>().trim_end().to_string()
            }
        };

        pairs.push((key, value));
    }

    Ok(pairs)
}

/// Reads a quoted value starting at `start` (the opening quote). Returns the
/// unescaped value and the position just after the closing quote.
#[allow(clippy::indexing_slicing)]
fn read_quoted(chars: &[char], start: usize, quote: char) -> SettingsResult<(String, usize)> {
    let mut value = String::new();
    let mut pos = start + 1;
    while pos < chars.len() {
        if chars[pos] == quote {
            if chars.get(pos + 1) == Some(&quote) {
                value.push(quote);
                pos += 2;
                continue;
            }
            return Ok((value, pos + 1));
        }
        value.push(chars[pos]);
        pos += 1;
    }
    Err(SettingsError::InvalidFormat {
        position: start,
        message: "unterminated quoted value".to_string(),
    })
}

/// Parses an ADO.NET boolean. `sspi` is accepted as true for integrated security.
pub fn parse_bool(keyword: &str, value: &str) -> SettingsResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "sspi" => Ok(true),
        "false" | "no" => Ok(false),
        _ => Err(SettingsError::InvalidBoolean {
            keyword: keyword.to_string(),
            value: value.to_string(),
        }),
    }
}

pub fn format_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_pairs() {
        let pairs = parse_pairs("Data Source=db01; Initial Catalog = Sales ;Integrated Security=True").unwrap();
        assert_eq!(
            pairs,
            vec![
                ("Data Source".to_string(), "db01".to_string()),
                ("Initial Catalog".to_string(), "Sales".to_string()),
                ("Integrated Security".to_string(), "True".to_string()),
            ]
        );
    }

    #[test]
    fn test_quoted_values() {
        let pairs = parse_pairs("a=\"x;y\"\"z\";b='it''s';c=\"\"").unwrap();
        assert_eq!(pairs[0].1, "x;y\"z");
        assert_eq!(pairs[1].1, "it's");
        assert_eq!(pairs[2].1, "");
    }

    #[test]
    fn test_trailing_and_repeated_separators() {
        let pairs = parse_pairs(";;a=1;;b=2;").unwrap();
        assert_eq!(pairs.len(), 2);
    }

    #[test]
    fn test_missing_equals_is_rejected() {
        let err = parse_pairs("Data Source").unwrap_err();
        assert!(matches!(err, SettingsError::InvalidFormat { .. }));
        assert!(parse_pairs("a=1;oops;b=2").is_err());
    }

    #[test]
    fn test_unterminated_quote_is_rejected() {
        assert!(parse_pairs("Password=\"abc").is_err());
    }

    #[test]
    fn test_garbage_after_quote_is_rejected() {
        assert!(parse_pairs("a=\"x\"y;b=1").is_err());
    }

    #[test]
    fn test_quote_value_rules() {
        assert_eq!(quote_value("plain"), "plain");
        assert_eq!(quote_value("with space"), "\"with space\"");
        assert_eq!(quote_value("a;b"), "\"a;b\"");
        assert_eq!(quote_value("say \"hi\""), "'say \"hi\"'");
        assert_eq!(quote_value("both ' and \""), "\"both ' and \"\"\"");
        assert_eq!(quote_value(r"C:\Data\app.mdf"), r"C:\Data\app.mdf");
    }

    #[test]
    fn test_append_and_parse_agree() {
        let values = ["simple", "a b", "x=y", "semi;colon", "q\"uote", "both'\"", "  padded  "];
        let mut out = String::new();
        for (i, value) in values.iter().enumerate() {
            append_pair(&mut out, &format!("k{}", i), value);
        }
        let parsed = parse_pairs(&out).unwrap();
        let parsed_values: Vec<&str> = parsed.iter().map(|(_, v)| v.as_str()).collect();
        assert_eq!(parsed_values, values);
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("k", "True").unwrap());
        assert!(parse_bool("k", "yes").unwrap());
        assert!(parse_bool("k", "SSPI").unwrap());
        assert!(!parse_bool("k", "false").unwrap());
        assert!(parse_bool("k", "maybe").is_err());
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  Initial   Catalog "), "initial catalog");
    }
}
