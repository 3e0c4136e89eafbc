//! Uniform feature-flag shape shared by every optional feature.
//!
//! A feature option is written as `true`/`false`, `"ci-only"`/`"local-only"`, or
//! an options object with an optional `enabled` field that accepts the same
//! scalar forms. [`resolve_feature`] turns any of these into `Some(options)` or
//! `None` against the run's CI flag.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::merge::merge_values;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CiOption {
    CiOnly,
    LocalOnly,
}

/// `boolean | 'ci-only' | 'local-only'`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnabledFlag {
    Bool(bool),
    Ci(CiOption),
}

impl EnabledFlag {
    pub fn resolve(self, ci: bool) -> bool {
        match self {
            EnabledFlag::Bool(value) => value,
            EnabledFlag::Ci(CiOption::CiOnly) => ci,
            EnabledFlag::Ci(CiOption::LocalOnly) => !ci,
        }
    }
}

impl From<bool> for EnabledFlag {
    fn from(value: bool) -> Self {
        EnabledFlag::Bool(value)
    }
}

/// Options object carrying an optional `enabled` switch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enabled<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<EnabledFlag>,
    #[serde(flatten)]
    pub options: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WithEnabled<T> {
    Bool(bool),
    Ci(CiOption),
    Options(Enabled<T>),
}

impl<T> WithEnabled<T> {
    pub fn options(options: T) -> Self {
        WithEnabled::Options(Enabled {
            enabled: None,
            options,
        })
    }
}

impl<T> From<bool> for WithEnabled<T> {
    fn from(value: bool) -> Self {
        WithEnabled::Bool(value)
    }
}

/// Resolve a feature option.
///
/// `false`, `{enabled: false}` and a CI flag that does not match the run yield
/// `None`. `true` and a matching CI flag yield `defaults`. An options object
/// yields its options layered over `defaults`.
pub fn resolve_feature<T>(value: Option<&WithEnabled<T>>, ci: bool, defaults: T) -> Option<T>
where
    T: Clone + Serialize + DeserializeOwned,
{
    match value? {
        WithEnabled::Bool(enabled) => enabled.then_some(defaults),
        WithEnabled::Ci(option) => EnabledFlag::Ci(*option).resolve(ci).then_some(defaults),
        WithEnabled::Options(Enabled { enabled, options }) => {
            if !enabled.unwrap_or(EnabledFlag::Bool(true)).resolve(ci) {
                return None;
            }
            Some(layer_defaults(defaults, options))
        }
    }
}

fn layer_defaults<T>(defaults: T, options: &T) -> T
where
    T: Clone + Serialize + DeserializeOwned,
{
    let (Ok(mut base), Ok(update)) = (serde_json::to_value(&defaults), serde_json::to_value(options))
    else {
        return options.clone();
    };
    merge_values(&mut base, &strip_nulls(update));
    serde_json::from_value(base).unwrap_or_else(|_| options.clone())
}

fn strip_nulls(value: serde_json::Value) -> serde_json::Value {
    match value {
        serde_json::Value::Object(map) => serde_json::Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        other => other,
    }
}
