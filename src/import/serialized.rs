//! Canonical list encoding for multi-valued columns.
//!
//! Flag sets and resource references are stored as opaque strings and
//! compared byte-for-byte during diffing, so the encoding must be stable:
//!
//! ```text
//! a:<count>:{i:0;s:<bytes>:"<value>";i:1;s:<bytes>:"<value>";}
//! ```
//!
//! Indexes run from 0 without gaps and `<bytes>` is the UTF-8 length of the
//! value. Values are not escaped; the length prefix delimits them. The
//! empty list is `a:0:{}`.

/// Encode an ordered list of strings.
#[must_use]
pub fn encode_list<S: AsRef<str>>(values: &[S]) -> String {
    let mut out = format!("a:{}:{{", values.len());

    for (index, value) in values.iter().enumerate() {
        let value = value.as_ref();
        out.push_str(&format!("i:{index};s:{}:\"{value}\";", value.len()));
    }

    out.push('}');
    out
}

/// Encode a flag set: `None` when no flag is set.
#[must_use]
pub fn encode_flags<'a>(flags: impl IntoIterator<Item = (&'a str, bool)>) -> Option<String> {
    let set: Vec<&str> = flags
        .into_iter()
        .filter_map(|(name, state)| state.then_some(name))
        .collect();

    if set.is_empty() {
        None
    } else {
        Some(encode_list(&set))
    }
}

/// Decode a list produced by [`encode_list`].
///
/// Returns `None` for anything that is not a well-formed encoding.
#[must_use]
pub fn decode_list(encoded: &str) -> Option<Vec<String>> {
    let rest = encoded.strip_prefix("a:")?;
    let (count, rest) = rest.split_once(":{")?;
    let count: usize = count.parse().ok()?;
    let mut rest = rest;
    let mut values = Vec::with_capacity(count);

    for index in 0..count {
        rest = rest.strip_prefix(&format!("i:{index};s:"))?;
        let (len, tail) = rest.split_once(":\"")?;
        let len: usize = len.parse().ok()?;
        let value = tail.get(..len)?;
        rest = tail.get(len..)?.strip_prefix("\";")?;
        values.push(value.to_string());
    }

    (rest == "}").then_some(values)
}
