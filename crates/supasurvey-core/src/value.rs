//! Submitted and cleaned field values.

use std::fmt;

use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Submitted data for one form instance, keyed by field key.
pub type FormData = IndexMap<String, RawValue>;

/// A raw submitted value. Its shape depends on the field type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    #[default]
    Missing,
    Text(String),
    /// Multi-choice selections or stored file ids.
    List(Vec<String>),
    /// Open choice: the recorded selection plus the accompanying free text.
    Choice {
        selection: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        other: Option<String>,
    },
}

impl RawValue {
    pub fn text(value: impl Into<String>) -> Self {
        RawValue::Text(value.into())
    }

    pub fn list<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RawValue::List(values.into_iter().map(Into::into).collect())
    }

    /// Whether nothing was filled in.
    pub fn is_blank(&self) -> bool {
        match self {
            RawValue::Missing => true,
            RawValue::Text(s) => s.trim().is_empty(),
            RawValue::List(items) => items.iter().all(|s| s.trim().is_empty()),
            RawValue::Choice { selection, other } => {
                selection.trim().is_empty()
                    && other.as_deref().map_or(true, |o| o.trim().is_empty())
            }
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        RawValue::Text(value.to_string())
    }
}

impl From<Vec<&str>> for RawValue {
    fn from(values: Vec<&str>) -> Self {
        RawValue::list(values)
    }
}

/// A value that passed field validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cleaned {
    Empty,
    Text(String),
    Choices(Vec<String>),
    Number(Decimal),
    Files(Vec<String>),
}

impl Cleaned {
    pub fn is_empty(&self) -> bool {
        match self {
            Cleaned::Empty => true,
            Cleaned::Text(s) => s.is_empty(),
            Cleaned::Choices(items) | Cleaned::Files(items) => items.is_empty(),
            Cleaned::Number(_) => false,
        }
    }

    /// Convert back to the raw shape used for persistence.
    pub fn to_raw(&self) -> RawValue {
        match self {
            Cleaned::Empty => RawValue::Missing,
            Cleaned::Text(s) => RawValue::Text(s.clone()),
            Cleaned::Choices(items) | Cleaned::Files(items) => RawValue::List(items.clone()),
            Cleaned::Number(n) => RawValue::Text(n.to_string()),
        }
    }
}

impl fmt::Display for Cleaned {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cleaned::Empty => Ok(()),
            Cleaned::Text(s) => f.write_str(s),
            Cleaned::Choices(items) | Cleaned::Files(items) => f.write_str(&items.join(", ")),
            Cleaned::Number(n) => write!(f, "{n}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_value_json_shapes() {
        let data: FormData = serde_json::from_str(
            r#"{
                "a": "Yes",
                "b": ["Treats", "Toys"],
                "c": {"selection": "Other", "other": "A podcast"},
                "d": null
            }"#,
        )
        .unwrap();

        assert_eq!(data["a"], RawValue::text("Yes"));
        assert_eq!(data["b"], RawValue::list(["Treats", "Toys"]));
        assert_eq!(
            data["c"],
            RawValue::Choice {
                selection: "Other".into(),
                other: Some("A podcast".into())
            }
        );
        assert_eq!(data["d"], RawValue::Missing);
    }

    #[test]
    fn blank_detection() {
        assert!(RawValue::Missing.is_blank());
        assert!(RawValue::text("  ").is_blank());
        assert!(RawValue::List(vec![]).is_blank());
        assert!(!RawValue::list(["x"]).is_blank());
        assert!(!RawValue::Choice {
            selection: "Other".into(),
            other: None
        }
        .is_blank());
    }

    #[test]
    fn cleaned_display() {
        assert_eq!(
            Cleaned::Choices(vec!["Treats".into(), "Toys".into()]).to_string(),
            "Treats, Toys"
        );
        assert!(Cleaned::Text(String::new()).is_empty());
        assert!(!Cleaned::Number(Decimal::ZERO).is_empty());
    }
}
