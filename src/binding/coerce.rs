//! String → typed value coercion.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BindingError {
    #[error("cannot bind '{key}': value '{value}' is not a valid {expected}")]
    TypeMismatch {
        key: String,
        value: String,
        expected: &'static str,
    },
}

/// Types a [`PropertyBinding`](crate::binding::PropertyBinding) can hold.
pub trait FromConfigValue: Sized {
    /// Human-readable type name used in errors.
    const EXPECTED: &'static str;

    /// Parse `raw`; `None` means the value is not acceptable for this type.
    fn from_config_value(raw: &str) -> Option<Self>;

    /// Parse `raw` for `key`, producing a [`BindingError`] on failure.
    fn coerce(key: &str, raw: &str) -> Result<Self, BindingError> {
        Self::from_config_value(raw).ok_or_else(|| BindingError::TypeMismatch {
            key: key.to_string(),
            value: raw.to_string(),
            expected: Self::EXPECTED,
        })
    }
}

impl FromConfigValue for String {
    const EXPECTED: &'static str = "string";

    fn from_config_value(raw: &str) -> Option<Self> {
        Some(raw.to_string())
    }
}

impl FromConfigValue for bool {
    const EXPECTED: &'static str = "boolean";

    fn from_config_value(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        }
    }
}

macro_rules! impl_from_str {
    ($($ty:ty => $name:literal),* $(,)?) => {
        $(
            impl FromConfigValue for $ty {
                const EXPECTED: &'static str = $name;

                fn from_config_value(raw: &str) -> Option<Self> {
                    raw.trim().parse().ok()
                }
            }
        )*
    };
}

impl_from_str! {
    i8 => "i8", i16 => "i16", i32 => "i32", i64 => "i64", i128 => "i128", isize => "isize",
    u8 => "u8", u16 => "u16", u32 => "u32", u64 => "u64", u128 => "u128", usize => "usize",
    f32 => "f32", f64 => "f64",
}

impl FromConfigValue for Duration {
    const EXPECTED: &'static str = "duration";

    /// `250ms`, `30s`, `5m`, `1h`, or a bare number of milliseconds.
    fn from_config_value(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let split = raw.find(|c: char| !c.is_ascii_digit()).unwrap_or(raw.len());
        let (digits, unit) = raw.split_at(split);
        let amount: u64 = digits.parse().ok()?;

        match unit.trim() {
            "" | "ms" => Some(Duration::from_millis(amount)),
            "s" => Some(Duration::from_secs(amount)),
            "m" => amount.checked_mul(60).map(Duration::from_secs),
            "h" => amount.checked_mul(3_600).map(Duration::from_secs),
            "d" => amount.checked_mul(86_400).map(Duration::from_secs),
            _ => None,
        }
    }
}

impl FromConfigValue for Vec<String> {
    const EXPECTED: &'static str = "list";

    fn from_config_value(raw: &str) -> Option<Self> {
        Some(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }
}

impl<T: FromConfigValue> FromConfigValue for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    /// An empty value binds as `None`.
    fn from_config_value(raw: &str) -> Option<Self> {
        if raw.trim().is_empty() {
            return Some(None);
        }
        T::from_config_value(raw).map(Some)
    }
}
