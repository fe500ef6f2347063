//! Per-operation timeouts configured through a `timeouts` block
//!
//! ```hcl
//! timeouts {
//!   create = "15m"
//!   delete = "1h30m"
//! }
//! ```

use crate::error::{Result, TfplugError};
use crate::schema::{AttributeBuilder, AttributeType, NestedBlock, NestedBlockBuilder, NestingMode};
use crate::types::{AttributePath, DynamicValue};
use std::time::Duration;

pub const TIMEOUTS_BLOCK: &str = "timeouts";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timeouts {
    pub create: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Timeouts {
    pub const fn new(create: Duration, update: Duration, delete: Duration) -> Self {
        Self {
            create,
            update,
            delete,
        }
    }

    pub const fn uniform(timeout: Duration) -> Self {
        Self::new(timeout, timeout, timeout)
    }

    /// Overlay values from the `timeouts` block of `config` onto `self`
    pub fn resolve(&self, config: &DynamicValue) -> Result<Self> {
        let read = |op: &str, default: Duration| -> Result<Duration> {
            let path = AttributePath::new(TIMEOUTS_BLOCK).attribute(op);
            match config.get_optional_string(&path) {
                Ok(Some(raw)) => parse_duration(&raw),
                Ok(None) => Ok(default),
                Err(e) if e.is_missing() => Ok(default),
                Err(TfplugError::TypeMismatch { .. }) => Ok(default),
                Err(e) => Err(e),
            }
        };

        Ok(Self {
            create: read("create", self.create)?,
            update: read("update", self.update)?,
            delete: read("delete", self.delete)?,
        })
    }

    /// Schema block accepting the three operation timeouts
    pub fn block() -> NestedBlock {
        let mut builder = NestedBlockBuilder::new(TIMEOUTS_BLOCK, NestingMode::Single)
            .description("Operation timeouts such as \"30s\" or \"1h30m\"");
        for op in ["create", "update", "delete"] {
            builder = builder.attribute(
                AttributeBuilder::new(op, AttributeType::String)
                    .optional()
                    .build(),
            );
        }
        builder.build()
    }
}

/// Parse durations such as `"90s"`, `"10m"`, `"1h30m"` or `"500ms"`
pub fn parse_duration(raw: &str) -> Result<Duration> {
    let input = raw.trim();
    if input.is_empty() {
        return Err(TfplugError::InvalidDuration(raw.to_string()));
    }

    let mut total = Duration::ZERO;
    let mut rest = input;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| TfplugError::InvalidDuration(raw.to_string()))?;
        if digits == 0 {
            return Err(TfplugError::InvalidDuration(raw.to_string()));
        }
        let value: u64 = rest[..digits]
            .parse()
            .map_err(|_| TfplugError::InvalidDuration(raw.to_string()))?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let part = match unit {
            "h" => value.checked_mul(3600).map(Duration::from_secs),
            "m" => value.checked_mul(60).map(Duration::from_secs),
            "s" => Some(Duration::from_secs(value)),
            "ms" => Some(Duration::from_millis(value)),
            _ => return Err(TfplugError::InvalidDuration(raw.to_string())),
        };
        total = part
            .and_then(|part| total.checked_add(part))
            .ok_or_else(|| TfplugError::InvalidDuration(raw.to_string()))?;
    }

    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_compound_durations() {
        assert_eq!(parse_duration("10m").unwrap(), Duration::from_secs(600));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn rejects_malformed_durations() {
        for raw in ["", "10", "m", "10x", "1h-5m"] {
            assert!(parse_duration(raw).is_err(), "{} should fail", raw);
        }
    }

    #[test]
    fn overflowing_durations_are_rejected() {
        for raw in ["9999999999999999h", "99999999999999999m", "18446744073709551615s1s"] {
            assert!(
                matches!(parse_duration(raw), Err(TfplugError::InvalidDuration(_))),
                "{} should fail",
                raw
            );
        }
        assert_eq!(
            parse_duration("18446744073709551615s").unwrap(),
            Duration::from_secs(u64::MAX)
        );
    }

    #[test]
    fn resolve_overlays_configured_values() {
        let defaults = Timeouts::uniform(Duration::from_secs(600));
        let mut config = DynamicValue::object();
        config
            .set_string(
                &AttributePath::new("timeouts").attribute("delete"),
                "30m".to_string(),
            )
            .unwrap();

        let resolved = defaults.resolve(&config).unwrap();

        assert_eq!(resolved.create, Duration::from_secs(600));
        assert_eq!(resolved.delete, Duration::from_secs(1800));
    }

    #[test]
    fn resolve_without_block_keeps_defaults() {
        let defaults = Timeouts::new(
            Duration::from_secs(60),
            Duration::from_secs(120),
            Duration::from_secs(180),
        );
        assert_eq!(defaults.resolve(&DynamicValue::object()).unwrap(), defaults);
    }

    #[test]
    fn resolve_surfaces_bad_duration() {
        let mut config = DynamicValue::object();
        config
            .set_string(
                &AttributePath::new("timeouts").attribute("create"),
                "soon".to_string(),
            )
            .unwrap();

        assert!(Timeouts::uniform(Duration::from_secs(1))
            .resolve(&config)
            .is_err());
    }
}
