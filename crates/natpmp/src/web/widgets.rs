//! Form Widgets
//!
//! Minimal models of the input widgets on the preferences page. They hold
//! display state only; conversion to config values happens on read.

use natpmp_types::ConfigKey;

use crate::error::{Error, Result};

/// Boolean checkbox
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checkbox {
    pub label: String,
    pub checked: bool,
}

impl Checkbox {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            checked: false,
        }
    }
}

/// Free-text input
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextField {
    pub label: String,
    pub value: String,
    pub disabled: bool,
}

impl TextField {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Default::default()
        }
    }
}

/// Numeric spinner with decimal precision 0
///
/// Keeps the raw text the user typed; [`SpinnerField::number`] coerces it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpinnerField {
    pub key: ConfigKey,
    pub label: String,
    pub text: String,
    pub min: u32,
    pub max: u32,
    pub disabled: bool,
}

impl SpinnerField {
    /// Spinner for a numeric config key, ranged from the key
    pub fn new(key: ConfigKey, label: impl Into<String>) -> Self {
        let (min, max) = key.numeric_range().unwrap_or((0, u32::MAX));
        Self {
            key,
            label: label.into(),
            text: min.to_string(),
            min,
            max,
            disabled: false,
        }
    }

    pub fn set_value(&mut self, value: u32) {
        self.text = value.to_string();
    }

    /// Blank reads as 0; numbers are rounded and clamped to the range
    pub fn number(&self) -> Result<u32> {
        let text = self.text.trim();
        if text.is_empty() {
            return Ok(self.min);
        }

        let value: f64 = text
            .parse()
            .ok()
            .filter(|v: &f64| v.is_finite())
            .ok_or_else(|| Error::InvalidField {
                field: self.key,
                value: self.text.clone(),
            })?;

        let clamped = value.round().clamp(self.min as f64, self.max as f64);
        Ok(clamped as u32)
    }
}

/// Read-only text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Label {
    pub text: String,
}
