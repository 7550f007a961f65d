//! `${NAME}` and `${NAME:-fallback}` expansion in config file text.

/// Expand placeholders from the process environment before the config file
/// is parsed. See [`expand_with`].
pub fn substitute_env(input: &str) -> String {
    expand_with(input, |name| std::env::var(name).ok())
}

/// Expand `${NAME}` from `lookup`, or to `fallback` for `${NAME:-fallback}`
/// when the variable is unset or empty. An unset variable without fallback
/// keeps its placeholder so the parser reports it in context. Text after an
/// unterminated `${` is copied unchanged.
pub fn expand_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let body = &rest[start + 2..];
        let Some(end) = body.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let placeholder = &rest[start..start + 2 + end + 1];
        let (name, fallback) = match body[..end].split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (&body[..end], None),
        };
        if !valid_name(name) {
            out.push_str(placeholder);
        } else {
            match (lookup(name), fallback) {
                (Some(value), Some(fallback)) if value.is_empty() => out.push_str(fallback),
                (Some(value), _) => out.push_str(&value),
                (None, Some(fallback)) => out.push_str(fallback),
                (None, None) => out.push_str(placeholder),
            }
        }
        rest = &body[end + 1..];
    }
    out.push_str(rest);
    out
}

fn valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "BRIDGEWAY_TEST_DB" => Some("acme_prod".into()),
            "BRIDGEWAY_EMPTY" => Some(String::new()),
            _ => None,
        }
    }

    #[test]
    fn expands_known_variable() {
        assert_eq!(
            expand_with("tenant = \"${BRIDGEWAY_TEST_DB}\"", lookup),
            "tenant = \"acme_prod\""
        );
    }

    #[test]
    fn unset_variable_keeps_placeholder() {
        assert_eq!(
            expand_with("${BRIDGEWAY_NONEXISTENT_XYZ}", lookup),
            "${BRIDGEWAY_NONEXISTENT_XYZ}"
        );
    }

    #[test]
    fn fallback_applies_to_unset_and_empty() {
        assert_eq!(expand_with("${BRIDGEWAY_MISSING:-read}", lookup), "read");
        assert_eq!(expand_with("${BRIDGEWAY_EMPTY:-read}", lookup), "read");
        assert_eq!(expand_with("${BRIDGEWAY_TEST_DB:-other}", lookup), "acme_prod");
        assert_eq!(expand_with("[${BRIDGEWAY_EMPTY}]", lookup), "[]");
    }

    #[test]
    fn unterminated_or_invalid_placeholder_is_literal() {
        assert_eq!(expand_with("a ${OPEN", lookup), "a ${OPEN");
        assert_eq!(expand_with("${not a name} x", lookup), "${not a name} x");
        assert_eq!(expand_with("cost: $5 ${}", lookup), "cost: $5 ${}");
    }

    #[test]
    fn text_without_placeholders_is_unchanged() {
        assert_eq!(expand_with("plain text", lookup), "plain text");
    }
}
