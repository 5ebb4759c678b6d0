//! Form snapshots handed to the core by whatever front end collects input.

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use serde_json::{Map, Value};

use crate::state::{Action, Dispatcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FormName {
    AuthLogin,
    AuthRegister,
    Repo,
    Payment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validator {
    Required,
    Email,
}

pub struct Field {
    pub name: &'static str,
    pub validators: &'static [Validator],
}

const AUTH_LOGIN_FIELDS: &[Field] = &[
    Field {
        name: "Name",
        validators: &[Validator::Required],
    },
    Field {
        name: "Password",
        validators: &[Validator::Required],
    },
    Field {
        name: "Remember",
        validators: &[],
    },
];

const AUTH_REGISTER_FIELDS: &[Field] = &[
    Field {
        name: "Email",
        validators: &[Validator::Required, Validator::Email],
    },
    Field {
        name: "Name",
        validators: &[Validator::Required],
    },
    Field {
        name: "Password",
        validators: &[Validator::Required],
    },
];

const REPO_FIELDS: &[Field] = &[Field {
    name: "Name",
    validators: &[Validator::Required],
}];

const PAYMENT_FIELDS: &[Field] = &[Field {
    name: "Plan",
    validators: &[Validator::Required],
}];

impl FormName {
    pub const ALL: [FormName; 4] = [
        FormName::AuthLogin,
        FormName::AuthRegister,
        FormName::Repo,
        FormName::Payment,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FormName::AuthLogin => "authLogin",
            FormName::AuthRegister => "authRegister",
            FormName::Repo => "repo",
            FormName::Payment => "payment",
        }
    }

    pub fn fields(self) -> &'static [Field] {
        match self {
            FormName::AuthLogin => AUTH_LOGIN_FIELDS,
            FormName::AuthRegister => AUTH_REGISTER_FIELDS,
            FormName::Repo => REPO_FIELDS,
            FormName::Payment => PAYMENT_FIELDS,
        }
    }

    /// First failing validator per field, in declaration order.
    pub fn errors(self, values: &Map<String, Value>) -> Vec<(&'static str, &'static str)> {
        self.fields()
            .iter()
            .filter_map(|field| {
                let value = values.get(field.name).unwrap_or(&Value::Null);
                field
                    .validators
                    .iter()
                    .find_map(|validator| validator.check(value))
                    .map(|message| (field.name, message))
            })
            .collect()
    }

    pub fn snapshot(self, values: Map<String, Value>) -> FormSnapshot {
        FormSnapshot {
            valid: self.errors(&values).is_empty(),
            touched: false,
            values,
        }
    }
}

impl fmt::Display for FormName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FormName {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        FormName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| anyhow!("unknown form: {s}"))
    }
}

impl Validator {
    pub fn check(self, value: &Value) -> Option<&'static str> {
        match self {
            Validator::Required => required(value),
            Validator::Email => email(value),
        }
    }
}

pub fn required(value: &Value) -> Option<&'static str> {
    let present = match value {
        Value::Null => false,
        Value::String(text) => !text.trim().is_empty(),
        _ => true,
    };
    (!present).then_some("required")
}

pub fn email(value: &Value) -> Option<&'static str> {
    let text = value.as_str().unwrap_or_default();
    if text.is_empty() {
        return None;
    }

    let valid = match text.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain
                    .split_once('.')
                    .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty())
        }
        None => false,
    };
    (!valid).then_some("invalid email address")
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormSnapshot {
    pub valid: bool,
    pub touched: bool,
    pub values: Map<String, Value>,
}

/// Values of `form` when it validates; otherwise marks it touched so the
/// front end shows the field errors, and returns `None`.
pub fn form_values_if_valid(dispatch: &Dispatcher, form: FormName) -> Option<Map<String, Value>> {
    let snapshot = dispatch
        .store()
        .read(|state| state.forms.get(&form).cloned())
        .unwrap_or_else(|| form.snapshot(Map::new()));

    if !snapshot.valid {
        dispatch.dispatch(Action::TouchForm(form));
        return None;
    }

    Some(snapshot.values)
}
