//! Deterministic job identifiers from request parameters.
//!
//! The id is the cache key for finished work: two requests whose restricted
//! parameters are equal map to the same id, and so to the same scratch space.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

/// Parameters that change between polls of the same request or carry secrets.
pub const VOLATILE_KEYS: &[&str] = &[
    "session_id",
    "job_id",
    "query_status",
    "token",
    "dry_run",
    "oda_api_version",
    "api",
    "off_line",
    "async_dispatcher",
    "verbose",
    "allow_unknown_args",
];

/// Key under which a user identity is mixed into the hash.
pub const USER_KEY: &str = "sub";

/// Which parameters take part in the job identity. Null values never do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Restriction {
    /// Everything except these keys.
    Exclude(Vec<String>),
    /// Only these keys.
    Only(Vec<String>),
}

impl Default for Restriction {
    fn default() -> Self {
        Restriction::Exclude(VOLATILE_KEYS.iter().map(|k| k.to_string()).collect())
    }
}

impl Restriction {
    pub fn allow_list<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Restriction::Only(keys.into_iter().map(Into::into).collect())
    }

    fn keeps(&self, key: &str) -> bool {
        match self {
            Restriction::Exclude(keys) => !keys.iter().any(|k| k == key),
            Restriction::Only(keys) => keys.iter().any(|k| k == key),
        }
    }

    pub fn apply(&self, params: &Map<String, Value>) -> Map<String, Value> {
        params
            .iter()
            .filter(|(k, v)| !v.is_null() && self.keeps(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Parameters relevant to the content of a request, with the default restriction.
pub fn restricted_params(params: &Map<String, Value>) -> Map<String, Value> {
    Restriction::default().apply(params)
}

/// Stable hash of a JSON value: SHA-256 over its compact serialization,
/// first 16 hex digits, upper-case. Object keys serialize sorted
/// (`serde_json::Map` is a `BTreeMap`; `preserve_order` must stay off).
pub fn make_hash(value: &Value) -> String {
    let canonical = value.to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    let hex = format!("{:X}", digest);
    hex[..16].to_string()
}

/// Job id for a request, optionally scoped to one user.
pub fn job_id(params: &Map<String, Value>, user: Option<&str>) -> String {
    job_id_with(&Restriction::default(), params, user)
}

pub fn job_id_with(
    restriction: &Restriction,
    params: &Map<String, Value>,
    user: Option<&str>,
) -> String {
    let mut restricted = restriction.apply(params);
    if let Some(user) = user {
        restricted.insert(USER_KEY.to_string(), Value::String(user.to_string()));
    }
    make_hash(&Value::Object(restricted))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn same_request_same_id_regardless_of_token_and_order() {
        let a = params(json!({ "instrument": "isgri", "E1_keV": 20, "E2_keV": 40, "token": "t1" }));
        let b = params(json!({ "E2_keV": 40, "token": "other", "E1_keV": 20, "instrument": "isgri" }));
        assert_eq!(job_id(&a, None), job_id(&b, None));
        assert_eq!(job_id(&a, None).len(), 16);
    }

    #[test]
    fn polling_fields_do_not_change_the_id() {
        let a = params(json!({ "instrument": "isgri", "query_status": "new" }));
        let b = params(json!({
            "instrument": "isgri",
            "query_status": "submitted",
            "session_id": "S",
            "job_id": "J",
            "async_dispatcher": true
        }));
        assert_eq!(job_id(&a, None), job_id(&b, None));
    }

    #[test]
    fn restricted_field_change_changes_the_id() {
        let a = params(json!({ "instrument": "isgri", "E1_keV": 20, "E2_keV": 40 }));
        let b = params(json!({ "instrument": "isgri", "E1_keV": 25, "E2_keV": 40 }));
        assert_ne!(job_id(&a, None), job_id(&b, None));
    }

    #[test]
    fn null_values_are_ignored() {
        let a = params(json!({ "instrument": "isgri" }));
        let b = params(json!({ "instrument": "isgri", "src_name": null }));
        assert_eq!(job_id(&a, None), job_id(&b, None));
    }

    #[test]
    fn user_scope_separates_ids() {
        let p = params(json!({ "instrument": "isgri" }));
        let anon = job_id(&p, None);
        let alice = job_id(&p, Some("alice@example.org"));
        assert_ne!(anon, alice);
        assert_eq!(alice, job_id(&p, Some("alice@example.org")));
    }

    #[test]
    fn nested_objects_hash_independently_of_key_order() {
        let a = json!({ "cat": { "ra": 1.5, "dec": -2 }, "list": [1, 2] });
        let b = json!({ "list": [1, 2], "cat": { "dec": -2, "ra": 1.5 } });
        assert_eq!(make_hash(&a), make_hash(&b));
        assert_ne!(make_hash(&a), make_hash(&json!({ "list": [2, 1], "cat": { "dec": -2, "ra": 1.5 } })));
    }

    #[test]
    fn hash_input_has_sorted_keys_at_every_level() {
        let v = json!({ "b": 1, "a": { "d": [2], "c": "x" } });
        assert_eq!(v.to_string(), r#"{"a":{"c":"x","d":[2]},"b":1}"#);
        let digest = Sha256::digest(r#"{"a":{"c":"x","d":[2]},"b":1}"#.as_bytes());
        assert_eq!(make_hash(&v), &format!("{:X}", digest)[..16]);
    }

    #[test]
    fn allow_list_restriction_keeps_only_named_keys() {
        let r = Restriction::allow_list(["instrument"]);
        let a = params(json!({ "instrument": "jemx", "E1_keV": 3 }));
        let b = params(json!({ "instrument": "jemx", "E1_keV": 5 }));
        assert_eq!(job_id_with(&r, &a, None), job_id_with(&r, &b, None));
        assert_eq!(r.apply(&a).len(), 1);
    }
}
