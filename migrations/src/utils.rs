//! Common utilities for naming, escaping and expression scanning

use regex::Regex;

// =============================================================================
// Hash Function
// =============================================================================

const DICTIONARY: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Generate a hash string from input, used for naming constraints
pub fn hash(input: &str, len: usize) -> String {
    let dict_len = DICTIONARY.len() as u128;
    let combinations_count = dict_len.pow(len as u32);
    let p: u128 = 53;
    let mut power: u128 = 1;
    let mut hash_val: u128 = 0;

    for ch in input.chars() {
        let code = ch as u128;
        hash_val = (hash_val + (code * power)) % combinations_count;
        power = (power * p) % combinations_count;
    }

    let mut result = Vec::with_capacity(len);
    let mut index = hash_val;

    for _ in 0..len {
        let idx = (index % dict_len) as usize;
        result.push(DICTIONARY[idx] as char);
        index /= dict_len;
    }

    result.into_iter().rev().collect()
}

/// Shorten a synthesized identifier to `max_len` bytes.
///
/// Names that fit are returned unchanged. Longer names keep a prefix and end
/// in `_` plus a hash of the full name, so distinct long names stay distinct.
pub fn fit_name(name: &str, max_len: usize) -> String {
    const HASH_LEN: usize = 8;
    if name.len() <= max_len || max_len <= HASH_LEN + 1 {
        return name.to_string();
    }

    let mut cut = max_len - HASH_LEN - 1;
    while !name.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}_{}", &name[..cut], hash(name, HASH_LEN))
}

// =============================================================================
// String Utilities
// =============================================================================

/// Trim a specific character from both ends of a string
pub fn trim_char(s: &str, c: char) -> String {
    s.trim_start_matches(c).trim_end_matches(c).to_string()
}

/// Escape a value for use inside a single-quoted SQL literal
pub fn escape_literal(input: &str, backslashes: bool) -> String {
    let value = if backslashes {
        input.replace('\\', "\\\\")
    } else {
        input.to_string()
    };
    value.replace('\'', "''")
}

/// Whether `expression` mentions `word` as a whole identifier.
///
/// Quoted occurrences (`"col"`, `` `col` ``, `[col]`) count as well, since the
/// quote characters are word boundaries.
pub fn mentions_identifier(expression: &str, word: &str) -> bool {
    let pattern = format!(r"(^|[^A-Za-z0-9_$]){}([^A-Za-z0-9_$]|$)", regex::escape(word));
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(expression),
        Err(_) => expression.contains(word),
    }
}

/// Replace whole-identifier occurrences of `from` in `expression` with `to`
pub fn replace_identifier(expression: &str, from: &str, to: &str) -> String {
    let pattern = format!(r"(^|[^A-Za-z0-9_$]){}([^A-Za-z0-9_$]|$)", regex::escape(from));
    match Regex::new(&pattern) {
        Ok(re) => {
            // Adjacent matches share a boundary character; a second pass
            // picks up the ones the first pass stepped over.
            let mut current = expression.to_string();
            for _ in 0..2 {
                current = re
                    .replace_all(&current, |caps: &regex::Captures<'_>| {
                        format!("{}{}{}", &caps[1], to, &caps[2])
                    })
                    .into_owned();
            }
            current
        }
        Err(_) => expression.to_string(),
    }
}

/// Replace references to the table `from` with `to`, both given as
/// `(schema, name)`.
///
/// A reference qualified with some other schema names a different table and
/// is left alone; unqualified references are replaced.
pub fn replace_table_reference(
    expression: &str,
    from: (&str, &str),
    to: (&str, &str),
) -> String {
    let (from_schema, from_name) = from;
    let (to_schema, to_name) = to;
    let name = regex::escape(from_name);
    let pattern = format!(
        r#"(^|[^A-Za-z0-9_$."`\]])((?:[A-Za-z0-9_$]+|"[^"]*"|`[^`]*`|\[[^\]]*\])\s*\.\s*)?({name}|"{name}"|`{name}`|\[{name}\])([^A-Za-z0-9_$]|$)"#
    );
    let Ok(re) = Regex::new(&pattern) else {
        return expression.to_string();
    };

    let mut current = expression.to_string();
    for _ in 0..2 {
        current = re
            .replace_all(&current, |caps: &regex::Captures<'_>| {
                let qualifier = caps.get(2).map_or("", |m| m.as_str());
                let schema =
                    unquote(qualifier.trim_end_matches(|c: char| c == '.' || c.is_whitespace()));
                if !qualifier.is_empty() && schema != from_schema {
                    return caps[0].to_string();
                }
                format!(
                    "{}{}{}{}",
                    &caps[1],
                    qualifier.replacen(schema, to_schema, 1),
                    caps[3].replacen(from_name, to_name, 1),
                    &caps[4]
                )
            })
            .into_owned();
    }
    current
}

fn unquote(ident: &str) -> &str {
    let quoted = ident.len() >= 2
        && matches!(
            (ident.chars().next(), ident.chars().last()),
            (Some('"'), Some('"')) | (Some('`'), Some('`')) | (Some('['), Some(']'))
        );
    if quoted { &ident[1..ident.len() - 1] } else { ident }
}

/// Generate a slug suitable for a migration directory name
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut last_underscore = true;
    for ch in input.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_underscore = false;
        } else if !last_underscore {
            slug.push('_');
            last_underscore = true;
        }
    }
    slug.trim_end_matches('_').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash() {
        let h1 = hash("test", 12);
        let h2 = hash("test", 12);
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 12);

        let h3 = hash("different", 12);
        assert_ne!(h1, h3);
    }

    #[test]
    fn test_fit_name() {
        assert_eq!(fit_name("users_pkey", 63), "users_pkey");

        let long = "a".repeat(80);
        let fitted = fit_name(&long, 63);
        assert_eq!(fitted.len(), 63);
        assert_ne!(fitted, fit_name(&"a".repeat(81), 63));
    }

    #[test]
    fn test_trim_char() {
        assert_eq!(trim_char("'hello'", '\''), "hello");
        assert_eq!(trim_char("hello", '\''), "hello");
    }

    #[test]
    fn test_escape_literal() {
        assert_eq!(escape_literal("it's a test", false), "it''s a test");
        assert_eq!(escape_literal("path\\to", true), "path\\\\to");
        assert_eq!(escape_literal("path\\to", false), "path\\to");
    }

    #[test]
    fn test_mentions_identifier() {
        assert!(mentions_identifier("age > 18", "age"));
        assert!(mentions_identifier("\"age\" > 18", "age"));
        assert!(!mentions_identifier("page > 18", "age"));
        assert!(!mentions_identifier("age_years > 18", "age"));
    }

    #[test]
    fn test_replace_identifier() {
        assert_eq!(
            replace_identifier("\"users\".\"age\" > 0 and age < 5", "age", "years"),
            "\"users\".\"years\" > 0 and years < 5"
        );
        assert_eq!(replace_identifier("page > 1", "age", "x"), "page > 1");
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Create users table!"), "create_users_table");
        assert_eq!(slugify("__init__"), "init");
    }
}
