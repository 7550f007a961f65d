//! Effective call parameters from layered profiles.

use {
    bridgeway_catalog::{FieldIssue, HandlerKind, ValidationError},
    bridgeway_config::CallProfile,
    secrecy::SecretString,
    serde_json::{Map, Value},
};

/// Fully resolved parameters for one upstream call. Never persisted.
#[derive(Debug, Clone)]
pub struct EffectiveCallParameters {
    pub address: String,
    pub tenant: String,
    pub principal: i64,
    pub credential: SecretString,
    pub model: String,
    pub method: String,
    pub domain: Value,
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingRequiredField(Vec<&'static str>),
}

impl ResolveError {
    pub fn fields(&self) -> &[&'static str] {
        match self {
            Self::MissingRequiredField(fields) => fields,
        }
    }
}

fn default_domain() -> Value {
    Value::Array(vec![Value::Array(Vec::new())])
}

/// Stack `explicit` over `stored` over `defaults` and check that every field
/// without a viable default ended up present. A blank value in one tier
/// falls through to the next. All missing fields are reported.
pub fn resolve(
    explicit: CallProfile,
    stored: Option<CallProfile>,
    defaults: &CallProfile,
) -> Result<EffectiveCallParameters, ResolveError> {
    let merged = explicit
        .without_blanks()
        .or(stored.unwrap_or_default().without_blanks())
        .or(defaults.clone().without_blanks());

    let mut missing = Vec::new();
    if merged.address.is_none() {
        missing.push("address");
    }
    if merged.tenant.is_none() {
        missing.push("tenant");
    }
    if merged.principal.is_none() {
        missing.push("principal");
    }
    if merged.credential.is_none() {
        missing.push("credential");
    }

    match (merged.address, merged.tenant, merged.principal, merged.credential) {
        (Some(address), Some(tenant), Some(principal), Some(credential)) => {
            Ok(EffectiveCallParameters {
                address,
                tenant,
                principal,
                credential,
                model: merged.model.unwrap_or_default(),
                method: merged.method.unwrap_or_default(),
                domain: merged.domain.unwrap_or_else(default_domain),
                fields: merged.fields.unwrap_or_default(),
            })
        },
        _ => Err(ResolveError::MissingRequiredField(missing)),
    }
}

// ── Explicit tier from tool arguments ────────────────────────────────────────

/// Read the explicit profile out of tool arguments. `raw_call` tools only
/// contribute connection fields; their `method` names the RPC method instead.
pub fn explicit_profile(args: &Value, handler: HandlerKind) -> Result<CallProfile, ValidationError> {
    let empty = Map::new();
    let obj = args.as_object().unwrap_or(&empty);
    let mut issues = Vec::new();

    let mut profile = CallProfile {
        address: string_arg(obj, &["address"], &mut issues),
        tenant: string_arg(obj, &["tenant", "database"], &mut issues),
        principal: integer_arg(obj, &["principal", "userId"], &mut issues),
        credential: string_arg(obj, &["credential", "password"], &mut issues)
            .map(SecretString::new),
        ..CallProfile::default()
    };

    if handler == HandlerKind::ExecuteKw {
        profile.model = string_arg(obj, &["model"], &mut issues);
        profile.method = string_arg(obj, &["method"], &mut issues);
        profile.domain = match first_present(obj, &["domain"]) {
            None => None,
            Some((_, v @ Value::Array(_))) => Some(v.clone()),
            Some((name, _)) => {
                issues.push(FieldIssue::wrong_type(name, "array"));
                None
            },
        };
        profile.fields = match first_present(obj, &["fields"]) {
            None => None,
            Some((name, Value::Array(items))) => {
                let names: Option<Vec<String>> =
                    items.iter().map(|v| v.as_str().map(String::from)).collect();
                if names.is_none() {
                    issues.push(FieldIssue::wrong_type(name, "array<string>"));
                }
                names
            },
            Some((name, _)) => {
                issues.push(FieldIssue::wrong_type(name, "array<string>"));
                None
            },
        };
    }

    if issues.is_empty() {
        Ok(profile)
    } else {
        Err(ValidationError::new(issues))
    }
}

fn first_present<'a>(
    obj: &'a Map<String, Value>,
    names: &[&'static str],
) -> Option<(&'static str, &'a Value)> {
    names
        .iter()
        .find_map(|name| obj.get(*name).filter(|v| !v.is_null()).map(|v| (*name, v)))
}

fn string_arg(
    obj: &Map<String, Value>,
    names: &[&'static str],
    issues: &mut Vec<FieldIssue>,
) -> Option<String> {
    match first_present(obj, names)? {
        (_, Value::String(s)) => Some(s.clone()),
        (name, _) => {
            issues.push(FieldIssue::wrong_type(name, "string"));
            None
        },
    }
}

fn integer_arg(
    obj: &Map<String, Value>,
    names: &[&'static str],
    issues: &mut Vec<FieldIssue>,
) -> Option<i64> {
    let (name, value) = first_present(obj, names)?;
    let parsed = value.as_i64();
    if parsed.is_none() {
        issues.push(FieldIssue::wrong_type(name, "integer"));
    }
    parsed
}

#[cfg(test)]
mod tests {
    use {super::*, secrecy::ExposeSecret, serde_json::json};

    fn connection() -> CallProfile {
        CallProfile {
            address: Some("http://erp.local/jsonrpc".into()),
            tenant: Some("acme".into()),
            principal: Some(2),
            credential: Some(SecretString::new("pw".into())),
            ..CallProfile::default()
        }
    }

    fn model_only(model: &str) -> CallProfile {
        CallProfile {
            model: Some(model.into()),
            ..CallProfile::default()
        }
    }

    #[test]
    fn explicit_beats_stored_beats_default() {
        let defaults = connection().or(CallProfile::compiled_defaults());

        let params = resolve(
            model_only("res.partner"),
            Some(model_only("res.users")),
            &defaults,
        )
        .unwrap();
        assert_eq!(params.model, "res.partner");

        let params = resolve(CallProfile::default(), Some(model_only("res.users")), &defaults)
            .unwrap();
        assert_eq!(params.model, "res.users");

        let params = resolve(CallProfile::default(), None, &defaults).unwrap();
        assert_eq!(params.model, "default.model");
        assert_eq!(params.method, "read");
        assert_eq!(params.fields, vec!["name".to_string()]);
        assert_eq!(params.domain, json!([[]]));
    }

    #[test]
    fn missing_address_in_every_tier() {
        let mut defaults = connection();
        defaults.address = None;
        let err = resolve(CallProfile::default(), None, &defaults).unwrap_err();
        assert_eq!(err, ResolveError::MissingRequiredField(vec!["address"]));
    }

    #[test]
    fn lists_every_missing_field() {
        let err = resolve(
            CallProfile::default(),
            None,
            &CallProfile::compiled_defaults(),
        )
        .unwrap_err();
        assert_eq!(err.fields(), ["address", "tenant", "principal", "credential"]);
    }

    #[test]
    fn blank_values_do_not_satisfy_requirements() {
        let explicit = CallProfile {
            address: Some("  ".into()),
            ..CallProfile::default()
        };
        let mut defaults = connection();
        defaults.address = None;
        let err = resolve(explicit, None, &defaults).unwrap_err();
        assert_eq!(err.fields(), ["address"]);
    }

    #[test]
    fn blank_explicit_values_fall_through() {
        let explicit = CallProfile {
            address: Some(String::new()),
            model: Some(String::new()),
            credential: Some(SecretString::new(String::new())),
            ..CallProfile::default()
        };
        let stored = CallProfile {
            method: Some(" ".into()),
            ..CallProfile::default()
        };
        let defaults = connection().or(CallProfile::compiled_defaults());
        let params = resolve(explicit, Some(stored), &defaults).unwrap();
        assert_eq!(params.address, "http://erp.local/jsonrpc");
        assert_eq!(params.model, "default.model");
        assert_eq!(params.method, "read");
        assert_eq!(params.credential.expose_secret(), "pw");
    }

    #[test]
    fn fields_default_to_empty_without_any_tier() {
        let params = resolve(CallProfile::default(), None, &connection()).unwrap();
        assert!(params.fields.is_empty());
        assert_eq!(params.domain, json!([[]]));
    }

    #[test]
    fn explicit_profile_accepts_aliases() {
        let profile = explicit_profile(
            &json!({"database": "acme", "userId": 7, "password": "pw", "fields": ["name"]}),
            HandlerKind::ExecuteKw,
        )
        .unwrap();
        assert_eq!(profile.tenant.as_deref(), Some("acme"));
        assert_eq!(profile.principal, Some(7));
        assert!(profile.has_credential());
        assert_eq!(profile.fields, Some(vec!["name".to_string()]));
    }

    #[test]
    fn explicit_profile_reports_type_errors() {
        let err = explicit_profile(
            &json!({"principal": "two", "domain": "x", "fields": [1]}),
            HandlerKind::ExecuteKw,
        )
        .unwrap_err();
        assert_eq!(err.field_names(), vec!["principal", "domain", "fields"]);
    }

    #[test]
    fn raw_call_ignores_model_fields() {
        let profile = explicit_profile(
            &json!({"method": "search_count", "model": "x", "tenant": "acme"}),
            HandlerKind::RawCall,
        )
        .unwrap();
        assert!(profile.method.is_none());
        assert!(profile.model.is_none());
        assert_eq!(profile.tenant.as_deref(), Some("acme"));
    }
}
