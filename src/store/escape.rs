//! Criteria template substitution.

/// Substitute parameter tokens in a criteria string.
///
/// For each `(token, value)` pair in order, every literal occurrence of the
/// trimmed token is replaced with the value, after turning double quotes in
/// the value into single quotes so it cannot close a double-quoted literal.
/// This is plain substring replacement: a token that also occurs elsewhere
/// in the criteria (or in an earlier substituted value) is replaced there
/// too. Empty tokens are skipped.
pub fn escape<K: AsRef<str>, V: AsRef<str>>(criteria: &str, parameters: &[(K, V)]) -> String {
    let mut escaped = criteria.to_string();
    for (token, value) in parameters {
        let token = token.as_ref().trim();
        if token.is_empty() {
            continue;
        }
        let value = value.as_ref().replace('"', "'");
        escaped = escaped.replace(token, &value);
    }
    escaped
}
