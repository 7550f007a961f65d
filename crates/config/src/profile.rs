//! Partial upstream call profiles and the process-wide default tier.
//!
//! A [`CallProfile`] is one layer of the precedence chain: explicit tool
//! arguments, a stored per-client configuration, or the process defaults.
//! Every field is optional; layers are stacked with [`CallProfile::or`].

use {
    secrecy::{ExposeSecret, SecretString},
    serde::Deserialize,
    serde_json::Value,
    tracing::warn,
};

pub const ENV_ADDRESS: &str = "API_ADDRESS";
pub const ENV_TENANT: &str = "DATABASE_NAME";
pub const ENV_PRINCIPAL: &str = "DATABASE_ID";
pub const ENV_CREDENTIAL: &str = "DATABASE_PASSWORD";
pub const ENV_MODEL: &str = "API_MODEL";
pub const ENV_METHOD: &str = "API_METHOD";
pub const ENV_FIELDS: &str = "API_FIELDS";

pub const DEFAULT_MODEL: &str = "default.model";
pub const DEFAULT_METHOD: &str = "read";
pub const DEFAULT_FIELDS: &[&str] = &["name"];

/// One layer of upstream call parameters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CallProfile {
    /// Upstream JSON-RPC endpoint.
    pub address: Option<String>,
    /// Database / tenant name, first positional argument.
    #[serde(alias = "database")]
    pub tenant: Option<String>,
    /// Numeric user id, second positional argument.
    #[serde(alias = "userId", alias = "databaseId")]
    pub principal: Option<i64>,
    #[serde(alias = "password")]
    pub credential: Option<SecretString>,
    pub model: Option<String>,
    pub method: Option<String>,
    /// Domain filter, sixth positional argument.
    pub domain: Option<Value>,
    pub fields: Option<Vec<String>>,
}

impl CallProfile {
    /// Stack `self` on top of `lower`: every absent field is taken from `lower`.
    pub fn or(self, lower: CallProfile) -> CallProfile {
        CallProfile {
            address: self.address.or(lower.address),
            tenant: self.tenant.or(lower.tenant),
            principal: self.principal.or(lower.principal),
            credential: self.credential.or(lower.credential),
            model: self.model.or(lower.model),
            method: self.method.or(lower.method),
            domain: self.domain.or(lower.domain),
            fields: self.fields.or(lower.fields),
        }
    }

    /// Drop blank strings and an empty credential so a lower layer can
    /// supply them.
    pub fn without_blanks(self) -> CallProfile {
        let text = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        CallProfile {
            address: text(self.address),
            tenant: text(self.tenant),
            principal: self.principal,
            credential: self.credential.filter(|c| !c.expose_secret().is_empty()),
            model: text(self.model),
            method: text(self.method),
            domain: self.domain.filter(|d| !d.is_null()),
            fields: self.fields,
        }
    }

    /// Values compiled into the binary. Address, tenant, principal and
    /// credential have no viable default.
    pub fn compiled_defaults() -> CallProfile {
        CallProfile {
            model: Some(DEFAULT_MODEL.into()),
            method: Some(DEFAULT_METHOD.into()),
            fields: Some(DEFAULT_FIELDS.iter().map(|f| (*f).to_string()).collect()),
            ..CallProfile::default()
        }
    }

    /// Build the environment tier from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CallProfile {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let principal = get(ENV_PRINCIPAL).and_then(|raw| match raw.trim().parse::<i64>() {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(var = ENV_PRINCIPAL, error = %e, "ignoring non-numeric principal");
                None
            },
        });

        let fields = get(ENV_FIELDS).map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(String::from)
                .collect()
        });

        CallProfile {
            address: get(ENV_ADDRESS),
            tenant: get(ENV_TENANT),
            principal,
            credential: get(ENV_CREDENTIAL).map(SecretString::new),
            model: get(ENV_MODEL),
            method: get(ENV_METHOD),
            domain: None,
            fields,
        }
    }

    /// JSON view with the credential masked, for display and logs.
    pub fn redacted(&self) -> Value {
        serde_json::json!({
            "address": self.address,
            "tenant": self.tenant,
            "principal": self.principal,
            "credential": self.credential.as_ref().map(|_| "***"),
            "model": self.model,
            "method": self.method,
            "domain": self.domain,
            "fields": self.fields,
        })
    }

    pub fn has_credential(&self) -> bool {
        self.credential
            .as_ref()
            .is_some_and(|c| !c.expose_secret().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use {super::*, std::collections::HashMap};

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn upper_layer_wins_field_by_field() {
        let upper = CallProfile {
            model: Some("res.partner".into()),
            ..CallProfile::default()
        };
        let lower = CallProfile {
            model: Some("res.users".into()),
            tenant: Some("acme".into()),
            ..CallProfile::default()
        };
        let merged = upper.or(lower);
        assert_eq!(merged.model.as_deref(), Some("res.partner"));
        assert_eq!(merged.tenant.as_deref(), Some("acme"));
        assert!(merged.address.is_none());
    }

    #[test]
    fn blank_values_fall_through_to_lower_layer() {
        let upper = CallProfile {
            address: Some(String::new()),
            tenant: Some("  ".into()),
            credential: Some(SecretString::new(String::new())),
            method: Some("search_read".into()),
            ..CallProfile::default()
        };
        let lower = CallProfile {
            address: Some("http://erp.local/jsonrpc".into()),
            tenant: Some("acme".into()),
            credential: Some(SecretString::new("pw".into())),
            method: Some("read".into()),
            ..CallProfile::default()
        };
        let merged = upper.without_blanks().or(lower);
        assert_eq!(merged.address.as_deref(), Some("http://erp.local/jsonrpc"));
        assert_eq!(merged.tenant.as_deref(), Some("acme"));
        assert!(merged.has_credential());
        assert_eq!(merged.method.as_deref(), Some("search_read"));
    }

    #[test]
    fn env_tier_parses_fields_and_principal() {
        let profile = CallProfile::from_lookup(env(&[
            (ENV_ADDRESS, "http://erp.local/jsonrpc"),
            (ENV_PRINCIPAL, " 2 "),
            (ENV_FIELDS, "name, email,,"),
            (ENV_CREDENTIAL, "s3cret"),
        ]));
        assert_eq!(profile.address.as_deref(), Some("http://erp.local/jsonrpc"));
        assert_eq!(profile.principal, Some(2));
        assert_eq!(
            profile.fields,
            Some(vec!["name".to_string(), "email".to_string()])
        );
        assert!(profile.has_credential());
    }

    #[test]
    fn env_tier_ignores_blank_and_invalid_values() {
        let profile =
            CallProfile::from_lookup(env(&[(ENV_ADDRESS, "  "), (ENV_PRINCIPAL, "admin")]));
        assert!(profile.address.is_none());
        assert!(profile.principal.is_none());
    }

    #[test]
    fn stored_profile_accepts_legacy_names() {
        let profile: CallProfile = serde_json::from_value(serde_json::json!({
            "database": "acme",
            "userId": 7,
            "password": "pw",
            "model": "res.partner"
        }))
        .unwrap();
        assert_eq!(profile.tenant.as_deref(), Some("acme"));
        assert_eq!(profile.principal, Some(7));
        assert_eq!(
            profile.credential.as_ref().map(|c| c.expose_secret().as_str()),
            Some("pw")
        );
    }

    #[test]
    fn redacted_view_masks_credential() {
        let profile = CallProfile {
            credential: Some(SecretString::new("hunter2".into())),
            ..CallProfile::default()
        };
        let shown = profile.redacted().to_string();
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("***"));
        assert!(!format!("{profile:?}").contains("hunter2"));
    }

    #[test]
    fn compiled_defaults_have_no_address() {
        let defaults = CallProfile::compiled_defaults();
        assert!(defaults.address.is_none());
        assert_eq!(defaults.model.as_deref(), Some(DEFAULT_MODEL));
        assert_eq!(defaults.fields, Some(vec!["name".to_string()]));
    }
}
