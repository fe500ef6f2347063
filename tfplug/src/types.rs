//! Core value types: dynamic values, attribute paths and diagnostics

use crate::error::{Result, TfplugError};
use std::collections::HashMap;
use std::fmt;

/// A Terraform value of any type.
///
/// Objects are represented as maps and all numbers are `f64`, the way
/// Terraform's type system treats them.
#[derive(Debug, Clone, PartialEq)]
pub enum Dynamic {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Dynamic>),
    Map(HashMap<String, Dynamic>),
    /// Not yet known during planning
    Unknown,
}

impl Dynamic {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Dynamic::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Dynamic::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Dynamic::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Dynamic>> {
        match self {
            Dynamic::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Dynamic::Null)
    }

    fn kind(&self) -> &'static str {
        match self {
            Dynamic::Null => "null",
            Dynamic::Bool(_) => "bool",
            Dynamic::Number(_) => "number",
            Dynamic::String(_) => "string",
            Dynamic::List(_) => "list",
            Dynamic::Map(_) => "map",
            Dynamic::Unknown => "unknown",
        }
    }
}

impl From<&str> for Dynamic {
    fn from(s: &str) -> Self {
        Dynamic::String(s.to_string())
    }
}

impl From<String> for Dynamic {
    fn from(s: String) -> Self {
        Dynamic::String(s)
    }
}

impl From<bool> for Dynamic {
    fn from(b: bool) -> Self {
        Dynamic::Bool(b)
    }
}

impl From<f64> for Dynamic {
    fn from(n: f64) -> Self {
        Dynamic::Number(n)
    }
}

impl From<i64> for Dynamic {
    fn from(n: i64) -> Self {
        Dynamic::Number(n as f64)
    }
}

impl<T: Into<Dynamic>> From<Option<T>> for Dynamic {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Dynamic::Null)
    }
}

impl<T: Into<Dynamic>> From<Vec<T>> for Dynamic {
    fn from(values: Vec<T>) -> Self {
        Dynamic::List(values.into_iter().map(Into::into).collect())
    }
}

/// Configuration, plan or state value exchanged with Terraform.
///
/// Use the typed accessors rather than matching on `value` directly; they
/// handle path navigation and report type mismatches.
#[derive(Debug, Clone, PartialEq)]
pub struct DynamicValue {
    pub value: Dynamic,
}

impl DynamicValue {
    pub fn new(value: Dynamic) -> Self {
        Self { value }
    }

    pub fn null() -> Self {
        Self {
            value: Dynamic::Null,
        }
    }

    /// An empty object, the usual starting point for building state
    pub fn object() -> Self {
        Self {
            value: Dynamic::Map(HashMap::new()),
        }
    }

    pub fn get(&self, path: &AttributePath) -> Result<&Dynamic> {
        let mut current = &self.value;

        for step in &path.steps {
            current = match (current, step) {
                (Dynamic::Map(m), AttributePathStep::AttributeName(name))
                | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => m
                    .get(name)
                    .ok_or_else(|| TfplugError::AttributeNotFound(path.to_string()))?,
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(idx)) => l
                    .get(*idx as usize)
                    .ok_or_else(|| TfplugError::AttributeNotFound(path.to_string()))?,
                (Dynamic::Null, _) => {
                    return Err(TfplugError::AttributeNotFound(path.to_string()))
                }
                (other, _) => {
                    return Err(TfplugError::TypeMismatch {
                        expected: "map or list".to_string(),
                        actual: other.kind().to_string(),
                    })
                }
            };
        }

        Ok(current)
    }

    pub fn get_string(&self, path: &AttributePath) -> Result<String> {
        let value = self.get(path)?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| mismatch("string", value))
    }

    pub fn get_number(&self, path: &AttributePath) -> Result<f64> {
        let value = self.get(path)?;
        value.as_number().ok_or_else(|| mismatch("number", value))
    }

    pub fn get_bool(&self, path: &AttributePath) -> Result<bool> {
        let value = self.get(path)?;
        value.as_bool().ok_or_else(|| mismatch("bool", value))
    }

    pub fn get_list(&self, path: &AttributePath) -> Result<Vec<Dynamic>> {
        match self.get(path)? {
            Dynamic::List(l) => Ok(l.clone()),
            other => Err(mismatch("list", other)),
        }
    }

    pub fn get_map(&self, path: &AttributePath) -> Result<HashMap<String, Dynamic>> {
        match self.get(path)? {
            Dynamic::Map(m) => Ok(m.clone()),
            other => Err(mismatch("map", other)),
        }
    }

    /// Absent, null and unknown all read as `None`; a value of the wrong type
    /// is still an error.
    pub fn get_optional_string(&self, path: &AttributePath) -> Result<Option<String>> {
        self.optional(path, |v| v.as_str().map(str::to_string), "string")
    }

    pub fn get_optional_number(&self, path: &AttributePath) -> Result<Option<f64>> {
        self.optional(path, Dynamic::as_number, "number")
    }

    pub fn get_optional_bool(&self, path: &AttributePath) -> Result<Option<bool>> {
        self.optional(path, Dynamic::as_bool, "bool")
    }

    /// Elements of a list of strings. Absent or null reads as empty.
    pub fn get_string_list(&self, path: &AttributePath) -> Result<Vec<String>> {
        match self.get(path) {
            Ok(Dynamic::List(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| mismatch("string", item))
                })
                .collect(),
            Ok(Dynamic::Null) | Ok(Dynamic::Unknown) => Ok(Vec::new()),
            Ok(other) => Err(mismatch("list", other)),
            Err(e) if e.is_missing() => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }

    pub fn set_string(&mut self, path: &AttributePath, value: String) -> Result<()> {
        self.set_value(path, Dynamic::String(value))
    }

    pub fn set_number(&mut self, path: &AttributePath, value: f64) -> Result<()> {
        self.set_value(path, Dynamic::Number(value))
    }

    pub fn set_bool(&mut self, path: &AttributePath, value: bool) -> Result<()> {
        self.set_value(path, Dynamic::Bool(value))
    }

    pub fn set_list(&mut self, path: &AttributePath, value: Vec<Dynamic>) -> Result<()> {
        self.set_value(path, Dynamic::List(value))
    }

    pub fn set_map(&mut self, path: &AttributePath, value: HashMap<String, Dynamic>) -> Result<()> {
        self.set_value(path, Dynamic::Map(value))
    }

    pub fn set_null(&mut self, path: &AttributePath) -> Result<()> {
        self.set_value(path, Dynamic::Null)
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.value, Dynamic::Unknown)
    }

    pub fn set_value(&mut self, path: &AttributePath, new_value: Dynamic) -> Result<()> {
        let Some((last, parents)) = path.steps.split_last() else {
            self.value = new_value;
            return Ok(());
        };

        if !matches!(self.value, Dynamic::Map(_)) {
            self.value = Dynamic::Map(HashMap::new());
        }

        let mut current = &mut self.value;
        for (idx, step) in parents.iter().enumerate() {
            let next = &path.steps[idx + 1];
            current = match (current, step) {
                (Dynamic::Map(m), AttributePathStep::AttributeName(name))
                | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => {
                    let slot = m.entry(name.clone()).or_insert(Dynamic::Null);
                    if slot.is_null() {
                        *slot = match next {
                            AttributePathStep::ElementKeyInt(_) => Dynamic::List(Vec::new()),
                            _ => Dynamic::Map(HashMap::new()),
                        };
                    }
                    slot
                }
                (Dynamic::List(l), AttributePathStep::ElementKeyInt(i)) => {
                    let len = l.len();
                    l.get_mut(*i as usize).ok_or_else(|| {
                        TfplugError::Custom(format!("list index {} out of bounds ({})", i, len))
                    })?
                }
                (other, _) => return Err(mismatch("map or list", other)),
            };
        }

        match (current, last) {
            (Dynamic::Map(m), AttributePathStep::AttributeName(name))
            | (Dynamic::Map(m), AttributePathStep::ElementKeyString(name)) => {
                m.insert(name.clone(), new_value);
                Ok(())
            }
            (Dynamic::List(l), AttributePathStep::ElementKeyInt(i)) => {
                let idx = *i as usize;
                if idx < l.len() {
                    l[idx] = new_value;
                    Ok(())
                } else if idx == l.len() {
                    l.push(new_value);
                    Ok(())
                } else {
                    Err(TfplugError::Custom(format!(
                        "list index {} out of bounds ({})",
                        idx,
                        l.len()
                    )))
                }
            }
            (other, _) => Err(mismatch("map or list", other)),
        }
    }

    fn optional<T>(
        &self,
        path: &AttributePath,
        extract: impl Fn(&Dynamic) -> Option<T>,
        expected: &str,
    ) -> Result<Option<T>> {
        match self.get(path) {
            Ok(Dynamic::Null) | Ok(Dynamic::Unknown) => Ok(None),
            Ok(value) => extract(value)
                .map(Some)
                .ok_or_else(|| mismatch(expected, value)),
            Err(e) if e.is_missing() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl From<HashMap<String, Dynamic>> for DynamicValue {
    fn from(map: HashMap<String, Dynamic>) -> Self {
        Self::new(Dynamic::Map(map))
    }
}

fn mismatch(expected: &str, actual: &Dynamic) -> TfplugError {
    TfplugError::TypeMismatch {
        expected: expected.to_string(),
        actual: actual.kind().to_string(),
    }
}

/// Path to an attribute within a [`DynamicValue`]
#[derive(Debug, Clone, PartialEq)]
pub struct AttributePath {
    pub steps: Vec<AttributePathStep>,
}

impl AttributePath {
    pub fn new(name: &str) -> Self {
        Self {
            steps: vec![AttributePathStep::AttributeName(name.to_string())],
        }
    }

    pub fn root() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn attribute(mut self, name: &str) -> Self {
        self.steps
            .push(AttributePathStep::AttributeName(name.to_string()));
        self
    }

    pub fn index(mut self, idx: i64) -> Self {
        self.steps.push(AttributePathStep::ElementKeyInt(idx));
        self
    }

    pub fn key(mut self, key: &str) -> Self {
        self.steps
            .push(AttributePathStep::ElementKeyString(key.to_string()));
        self
    }
}

impl fmt::Display for AttributePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            match step {
                AttributePathStep::AttributeName(name) if i == 0 => write!(f, "{}", name)?,
                AttributePathStep::AttributeName(name) => write!(f, ".{}", name)?,
                AttributePathStep::ElementKeyString(key) => write!(f, "[\"{}\"]", key)?,
                AttributePathStep::ElementKeyInt(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributePathStep {
    AttributeName(String),
    ElementKeyString(String),
    ElementKeyInt(i64),
}

/// A warning or error reported back to Terraform
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: DiagnosticSeverity,
    pub summary: String,
    pub detail: String,
    pub attribute: Option<AttributePath>,
}

impl Diagnostic {
    pub fn error(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn warning(summary: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: detail.into(),
            attribute: None,
        }
    }

    pub fn with_attribute(mut self, path: AttributePath) -> Self {
        self.attribute = Some(path);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

/// True when any diagnostic in the slice is an error
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_round_trips_through_path() {
        let mut dv = DynamicValue::object();
        dv.set_string(&AttributePath::new("name"), "listener-a".to_string())
            .unwrap();

        assert_eq!(
            dv.get_string(&AttributePath::new("name")).unwrap(),
            "listener-a"
        );
    }

    #[test]
    fn nested_set_creates_intermediate_maps() {
        let mut dv = DynamicValue::object();
        let path = AttributePath::new("health_monitor").attribute("delay");
        dv.set_number(&path, 5.0).unwrap();

        assert_eq!(dv.get_number(&path).unwrap(), 5.0);
    }

    #[test]
    fn list_index_can_append() {
        let mut dv = DynamicValue::object();
        dv.set_list(&AttributePath::new("rules"), vec![]).unwrap();
        dv.set_string(
            &AttributePath::new("rules").index(0).attribute("field"),
            "host".to_string(),
        )
        .unwrap_err();

        dv.set_value(
            &AttributePath::new("rules").index(0),
            Dynamic::Map(HashMap::new()),
        )
        .unwrap();
        dv.set_string(
            &AttributePath::new("rules").index(0).attribute("field"),
            "host".to_string(),
        )
        .unwrap();

        assert_eq!(
            dv.get_string(&AttributePath::new("rules").index(0).attribute("field"))
                .unwrap(),
            "host"
        );
    }

    #[test]
    fn optional_getters_treat_absent_and_null_as_none() {
        let mut dv = DynamicValue::object();
        dv.set_null(&AttributePath::new("port")).unwrap();

        assert_eq!(dv.get_optional_number(&AttributePath::new("port")).unwrap(), None);
        assert_eq!(dv.get_optional_string(&AttributePath::new("name")).unwrap(), None);
        assert!(dv.get_string(&AttributePath::new("name")).unwrap_err().is_missing());
    }

    #[test]
    fn optional_getter_rejects_wrong_type() {
        let mut dv = DynamicValue::object();
        dv.set_bool(&AttributePath::new("port"), true).unwrap();

        let err = dv
            .get_optional_number(&AttributePath::new("port"))
            .unwrap_err();
        assert!(matches!(err, TfplugError::TypeMismatch { .. }));
    }

    #[test]
    fn string_list_reads_elements() {
        let mut dv = DynamicValue::object();
        dv.set_value(
            &AttributePath::new("allowed_vlans"),
            Dynamic::from(vec!["100", "200"]),
        )
        .unwrap();

        assert_eq!(
            dv.get_string_list(&AttributePath::new("allowed_vlans"))
                .unwrap(),
            vec!["100".to_string(), "200".to_string()]
        );
        assert!(dv
            .get_string_list(&AttributePath::new("security_groups"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn path_display() {
        let path = AttributePath::new("rules").index(1).attribute("value");
        assert_eq!(path.to_string(), "rules[1].value");
    }
}
