use crate::types::{AttributePath, Diagnostic, Dynamic};

/// Validates a known, non-null configuration value
pub trait Validator: Send + Sync {
    fn description(&self) -> String;

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>);
}

pub struct StringLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl StringLengthValidator {
    pub fn at_least(min: usize) -> Self {
        Self {
            min: Some(min),
            max: None,
        }
    }
}

impl Validator for StringLengthValidator {
    fn description(&self) -> String {
        format!(
            "string length must be between {} and {}",
            self.min.unwrap_or(0),
            self.max.map_or("unbounded".to_string(), |m| m.to_string())
        )
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        if let Some(s) = value.as_str() {
            let len = s.chars().count();
            if let Some(min) = self.min {
                if len < min {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("{} must have minimum length of {}", path, min),
                            format!("Got length {}", len),
                        )
                        .with_attribute(path.clone()),
                    );
                }
            }
            if let Some(max) = self.max {
                if len > max {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("{} must have maximum length of {}", path, max),
                            format!("Got length {}", len),
                        )
                        .with_attribute(path.clone()),
                    );
                }
            }
        }
    }
}

/// Regex match on string values; the pattern is compiled on use
pub struct StringPatternValidator {
    pub pattern: String,
    pub description: String,
}

impl StringPatternValidator {
    pub fn new(pattern: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            description: description.into(),
        }
    }
}

impl Validator for StringPatternValidator {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        let Some(s) = value.as_str() else {
            return;
        };

        match regex::Regex::new(&self.pattern) {
            Ok(re) if re.is_match(s) => {}
            Ok(_) => diagnostics.push(
                Diagnostic::error(
                    format!("{} must match {}", path, self.description),
                    format!("Value '{}' does not match pattern", s),
                )
                .with_attribute(path.clone()),
            ),
            Err(e) => diagnostics.push(
                Diagnostic::error(
                    format!("Invalid validation pattern for {}", path),
                    e.to_string(),
                )
                .with_attribute(path.clone()),
            ),
        }
    }
}

pub struct StringOneOfValidator {
    pub allowed: Vec<String>,
}

impl StringOneOfValidator {
    pub fn new<I, S>(allowed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: allowed.into_iter().map(Into::into).collect(),
        }
    }
}

impl Validator for StringOneOfValidator {
    fn description(&self) -> String {
        format!("value must be one of: {}", self.allowed.join(", "))
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        if let Some(s) = value.as_str() {
            if !self.allowed.iter().any(|a| a == s) {
                diagnostics.push(
                    Diagnostic::error(
                        format!("{} must be one of: {}", path, self.allowed.join(", ")),
                        format!("Got '{}'", s),
                    )
                    .with_attribute(path.clone()),
                );
            }
        }
    }
}

pub struct NumberRangeValidator {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Validator for NumberRangeValidator {
    fn description(&self) -> String {
        format!("number must be within {:?}..={:?}", self.min, self.max)
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        if let Some(n) = value.as_number() {
            if let Some(min) = self.min {
                if n < min {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("{} must be at least {}", path, min),
                            format!("Got {}", n),
                        )
                        .with_attribute(path.clone()),
                    );
                }
            }
            if let Some(max) = self.max {
                if n > max {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("{} must be at most {}", path, max),
                            format!("Got {}", n),
                        )
                        .with_attribute(path.clone()),
                    );
                }
            }
        }
    }
}

pub struct ListLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl Validator for ListLengthValidator {
    fn description(&self) -> String {
        format!("list must have between {:?} and {:?} items", self.min, self.max)
    }

    fn validate(&self, value: &Dynamic, path: &AttributePath, diagnostics: &mut Vec<Diagnostic>) {
        if let Dynamic::List(items) = value {
            if let Some(min) = self.min {
                if items.len() < min {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("{} must have at least {} items", path, min),
                            format!("Got {} items", items.len()),
                        )
                        .with_attribute(path.clone()),
                    );
                }
            }
            if let Some(max) = self.max {
                if items.len() > max {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("{} must have at most {} items", path, max),
                            format!("Got {} items", items.len()),
                        )
                        .with_attribute(path.clone()),
                    );
                }
            }
        }
    }
}
