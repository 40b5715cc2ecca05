//! JSON Pointer (RFC 6901)
//!
//! Validation, lookup and assignment over `serde_json::Value` documents.
//!
//! # Path Format
//!
//! - `/foo` - property "foo"
//! - `/foo/bar` - nested property
//! - `/items/0` - array element at index 0
//! - `/items/-` - one past the end of an array (assignment only)
//! - `/a~1b` - property "a/b", `~0` stands for `~`
//!
//! The empty string addresses the whole document in RFC 6901, but bindings
//! never target the root, so [`validate`] rejects it.

use serde_json::{Map, Value};

use super::error::{A2uiError, Result};

/// Check pointer syntax without touching any document.
pub fn validate(pointer: &str) -> Result<()> {
    if pointer.is_empty() {
        return Err(A2uiError::pointer(pointer, "pointer is empty"));
    }

    if !pointer.starts_with('/') {
        return Err(A2uiError::pointer(pointer, "pointer must start with '/'"));
    }

    let mut chars = pointer.chars();
    while let Some(ch) = chars.next() {
        if ch == '~' {
            match chars.next() {
                Some('0') | Some('1') => {}
                Some(other) => {
                    return Err(A2uiError::pointer(
                        pointer,
                        format!("invalid escape ~{other}"),
                    ));
                }
                None => return Err(A2uiError::pointer(pointer, "trailing ~")),
            }
        }
    }

    Ok(())
}

/// Split a validated pointer into unescaped reference tokens.
pub fn parse(pointer: &str) -> Result<Vec<String>> {
    validate(pointer)?;

    Ok(pointer.split('/').skip(1).map(unescape_token).collect())
}

/// Undo `~1` and `~0` in a single token. Assumes the token already validated.
pub fn unescape_token(token: &str) -> String {
    token.replace("~1", "/").replace("~0", "~")
}

/// Escape a key so it can be embedded as one pointer token.
pub fn escape_token(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

/// Append one unescaped key to a base pointer.
pub fn push(base: &str, token: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), escape_token(token))
}

/// Look up `pointer` in `doc`.
///
/// Fails with [`A2uiError::InvalidPointer`] on bad syntax and with
/// [`A2uiError::Unresolved`] when the target does not exist.
pub fn get<'a>(doc: &'a Value, pointer: &str) -> Result<&'a Value> {
    validate(pointer)?;

    doc.pointer(pointer)
        .ok_or_else(|| A2uiError::Unresolved(pointer.to_string()))
}

/// Assign `value` at `pointer`, creating missing intermediate containers.
///
/// A missing intermediate becomes an array when the following token is an
/// array index or `-`, otherwise an object. Traversing through a scalar, or
/// using a non-index token on an array, fails and may leave the document
/// partially extended, so callers work on a copy.
pub fn set(doc: &mut Value, pointer: &str, value: Value) -> Result<()> {
    let tokens = parse(pointer)?;
    let Some((last, parents)) = tokens.split_last() else {
        return Err(A2uiError::pointer(pointer, "pointer has no tokens"));
    };

    let mut current = doc;
    for (i, token) in parents.iter().enumerate() {
        let next = tokens.get(i + 1).map(String::as_str).unwrap_or_default();
        current = descend_or_create(current, token, next, pointer)?;
    }

    match current {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            Ok(())
        }
        Value::Array(items) => {
            let index = parse_index(last, items.len(), pointer)?;
            if index == items.len() {
                items.push(value);
            } else {
                items[index] = value;
            }
            Ok(())
        }
        _ => Err(A2uiError::pointer(
            pointer,
            "cannot set a member on a non-container value",
        )),
    }
}

/// Assign `value` at `pointer`, forcing object segments all the way down.
///
/// Any intermediate that is missing, a scalar, or an array is replaced by an
/// empty object. Tokens are unescaped but not validated. Used when [`set`]
/// refuses a path.
pub fn set_forced(doc: &mut Value, pointer: &str, value: Value) -> Result<()> {
    if pointer.is_empty() {
        return Err(A2uiError::pointer(pointer, "pointer is empty"));
    }

    let keys: Vec<String> = pointer
        .strip_prefix('/')
        .unwrap_or(pointer)
        .split('/')
        .map(unescape_token)
        .collect();

    let Some((last, parents)) = keys.split_last() else {
        return Err(A2uiError::pointer(pointer, "pointer has no keys"));
    };

    if !doc.is_object() {
        *doc = Value::Object(Map::new());
    }

    let mut current = doc;
    for key in parents {
        let map = match current {
            Value::Object(map) => map,
            _ => return Err(A2uiError::pointer(pointer, "forced walk left object space")),
        };
        let slot = map
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        current = slot;
    }

    if let Value::Object(map) = current {
        map.insert(last.clone(), value);
    }

    Ok(())
}

fn descend_or_create<'a>(
    value: &'a mut Value,
    token: &str,
    next: &str,
    pointer: &str,
) -> Result<&'a mut Value> {
    let empty_container = || {
        if next == "-" || next.parse::<usize>().is_ok() {
            Value::Array(Vec::new())
        } else {
            Value::Object(Map::new())
        }
    };

    match value {
        Value::Object(map) => Ok(map.entry(token.to_string()).or_insert_with(empty_container)),
        Value::Array(items) => {
            let index = parse_index(token, items.len(), pointer)?;
            if index == items.len() {
                items.push(empty_container());
            }
            Ok(&mut items[index])
        }
        _ => Err(A2uiError::pointer(
            pointer,
            format!("cannot descend into non-container value at token {token:?}"),
        )),
    }
}

/// Parse an array token. `-` and `len` both mean "append".
fn parse_index(token: &str, len: usize, pointer: &str) -> Result<usize> {
    if token == "-" {
        return Ok(len);
    }

    let index = token
        .parse::<usize>()
        .map_err(|_| A2uiError::pointer(pointer, format!("invalid array index {token:?}")))?;

    if index > len {
        Err(A2uiError::pointer(
            pointer,
            format!("array index {index} out of bounds"),
        ))
    } else {
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate() {
        assert!(validate("/user/name").is_ok());
        assert!(validate("/a~0b/c~1d").is_ok());
        assert!(validate("/").is_ok());

        assert!(validate("").is_err());
        assert!(validate("user/name").is_err());
        assert!(validate("/bad~2escape").is_err());
        assert!(validate("/trailing~").is_err());
    }

    #[test]
    fn test_parse_unescapes_tokens() {
        assert_eq!(parse("/a~1b/c~0d").unwrap(), vec!["a/b", "c~d"]);
        assert_eq!(parse("/~01").unwrap(), vec!["~1"]);
    }

    #[test]
    fn test_get() {
        let doc = json!({"user": {"name": "Ada"}, "items": [1, 2, 3], "a/b": true});

        assert_eq!(get(&doc, "/user/name").unwrap(), &json!("Ada"));
        assert_eq!(get(&doc, "/items/2").unwrap(), &json!(3));
        assert_eq!(get(&doc, "/a~1b").unwrap(), &json!(true));
        assert!(matches!(get(&doc, "/user/age"), Err(A2uiError::Unresolved(_))));
        assert!(matches!(get(&doc, "user"), Err(A2uiError::InvalidPointer { .. })));
    }

    #[test]
    fn test_set_creates_intermediates() {
        let mut doc = json!({});
        set(&mut doc, "/user/name", json!("Ada")).unwrap();
        set(&mut doc, "/tags/0", json!("first")).unwrap();
        set(&mut doc, "/tags/-", json!("second")).unwrap();

        assert_eq!(doc, json!({"user": {"name": "Ada"}, "tags": ["first", "second"]}));
    }

    #[test]
    fn test_set_rejects_scalar_traversal() {
        let mut doc = json!({"user": "Ada"});
        assert!(set(&mut doc, "/user/name", json!("x")).is_err());

        let mut doc = json!({"items": [1]});
        assert!(set(&mut doc, "/items/5", json!(2)).is_err());
        assert!(set(&mut doc, "/items/name", json!(2)).is_err());
    }

    #[test]
    fn test_set_forced_replaces_non_objects() {
        let mut doc = json!({"user": "Ada", "list": [1, 2]});
        set_forced(&mut doc, "/user/name", json!("Ada")).unwrap();
        set_forced(&mut doc, "/list/first", json!(1)).unwrap();
        set_forced(&mut doc, "/a~1b/c~0d", json!(true)).unwrap();

        assert_eq!(
            doc,
            json!({
                "user": {"name": "Ada"},
                "list": {"first": 1},
                "a/b": {"c~d": true}
            })
        );
    }

    #[test]
    fn test_set_forced_on_scalar_root() {
        let mut doc = json!(42);
        set_forced(&mut doc, "/x", json!(1)).unwrap();
        assert_eq!(doc, json!({"x": 1}));

        assert!(set_forced(&mut doc, "", json!(1)).is_err());
    }

    #[test]
    fn test_push_escapes() {
        assert_eq!(push("/items", "0"), "/items/0");
        assert_eq!(push("/", "a/b"), "/a~1b");
    }
}
