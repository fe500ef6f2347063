//! Attribute validators run by [`crate::schema::Schema::validate`]

use crate::types::{AttributePath, Diagnostic, Dynamic};

pub trait Validator: Send + Sync {
    fn description(&self) -> String;

    /// Only called for known, non-null values
    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>);
}

fn invalid(path: &AttributePath, summary: String, detail: String) -> Diagnostic {
    Diagnostic::error(summary, detail).with_attribute(path.clone())
}

pub struct StringLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Validator for StringLengthValidator {
    fn description(&self) -> String {
        format!("string length between {:?} and {:?}", self.min, self.max)
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        let Some(s) = value.as_str() else { return };
        let len = s.chars().count();
        if let Some(min) = self.min {
            if len < min {
                diagnostics.push(invalid(
                    path,
                    format!("{} must have minimum length of {}", path, min),
                    format!("Got length {}", len),
                ));
            }
        }
        if let Some(max) = self.max {
            if len > max {
                diagnostics.push(invalid(
                    path,
                    format!("{} must have maximum length of {}", path, max),
                    format!("Got length {}", len),
                ));
            }
        }
    }
}

pub struct StringPatternValidator {
    pub pattern: regex::Regex,
    pub description: String,
}

impl StringPatternValidator {
    pub fn new(pattern: &str, description: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: regex::Regex::new(pattern)?,
            description: description.to_string(),
        })
    }
}

impl Validator for StringPatternValidator {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        let Some(s) = value.as_str() else { return };
        if !self.pattern.is_match(s) {
            diagnostics.push(invalid(
                path,
                format!("{} must match {}", path, self.description),
                format!("Value '{}' does not match {}", s, self.pattern.as_str()),
            ));
        }
    }
}

pub struct NumberRangeValidator {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Validator for NumberRangeValidator {
    fn description(&self) -> String {
        format!("number between {:?} and {:?}", self.min, self.max)
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        let Some(n) = value.as_number() else { return };
        if let Some(min) = self.min {
            if n < min {
                diagnostics.push(invalid(
                    path,
                    format!("{} must be at least {}", path, min),
                    format!("Got {}", n),
                ));
            }
        }
        if let Some(max) = self.max {
            if n > max {
                diagnostics.push(invalid(
                    path,
                    format!("{} must be at most {}", path, max),
                    format!("Got {}", n),
                ));
            }
        }
    }
}

/// Accepts only strings from a fixed set
pub struct OneOfValidator {
    pub allowed: Vec<String>,
}

impl OneOfValidator {
    pub fn new(allowed: &[&str]) -> Self {
        Self {
            allowed: allowed.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Validator for OneOfValidator {
    fn description(&self) -> String {
        format!("one of {:?}", self.allowed)
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        let Some(s) = value.as_str() else { return };
        if !self.allowed.iter().any(|a| a == s) {
            diagnostics.push(invalid(
                path,
                format!("{} has an invalid value", path),
                format!("Expected one of {:?}, got '{}'", self.allowed, s),
            ));
        }
    }
}

pub struct ListLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Validator for ListLengthValidator {
    fn description(&self) -> String {
        format!("list length between {:?} and {:?}", self.min, self.max)
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        let Dynamic::List(items) = value else { return };
        if let Some(min) = self.min {
            if items.len() < min {
                diagnostics.push(invalid(
                    path,
                    format!("{} must have at least {} items", path, min),
                    format!("Got {} items", items.len()),
                ));
            }
        }
        if let Some(max) = self.max {
            if items.len() > max {
                diagnostics.push(invalid(
                    path,
                    format!("{} must have at most {} items", path, max),
                    format!("Got {} items", items.len()),
                ));
            }
        }
    }
}
