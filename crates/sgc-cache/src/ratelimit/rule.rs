//! Rate rules written as `"<n> per <period>"`

use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::time::Duration;

use sgc_common::config::RateLimitConfig;

/// Window length of a rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RatePeriod {
    Second,
    Minute,
    Hour,
    Day,
}

impl RatePeriod {
    pub fn as_secs(self) -> u64 {
        match self {
            Self::Second => 1,
            Self::Minute => 60,
            Self::Hour => 3_600,
            Self::Day => 86_400,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Second => "second",
            Self::Minute => "minute",
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }
}

/// Rule parse failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid rate rule {0:?}: expected \"<n> per <second|minute|hour|day>\"")]
pub struct RateRuleError(pub String);

/// `limit` requests per `period`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RateRule {
    pub limit: NonZeroU32,
    pub period: RatePeriod,
}

impl RateRule {
    pub fn new(limit: NonZeroU32, period: RatePeriod) -> Self {
        Self { limit, period }
    }

    pub fn window(&self) -> Duration {
        Duration::from_secs(self.period.as_secs())
    }
}

impl FromStr for RateRule {
    type Err = RateRuleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || RateRuleError(s.to_string());
        let normalized = s.trim().to_ascii_lowercase();
        let mut parts = normalized.split_whitespace();

        let limit = parts
            .next()
            .and_then(|n| n.parse::<u32>().ok())
            .and_then(NonZeroU32::new)
            .ok_or_else(err)?;
        if parts.next() != Some("per") {
            return Err(err());
        }
        let period = match parts.next().map(|p| p.trim_end_matches('s')) {
            Some("second") => RatePeriod::Second,
            Some("minute") => RatePeriod::Minute,
            Some("hour") => RatePeriod::Hour,
            Some("day") => RatePeriod::Day,
            _ => return Err(err()),
        };
        if parts.next().is_some() {
            return Err(err());
        }

        Ok(Self { limit, period })
    }
}

impl fmt::Display for RateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} per {}", self.limit, self.period.as_str())
    }
}

/// Parsed per-route rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateRules {
    pub login: RateRule,
    pub refresh: RateRule,
    pub forgot: RateRule,
    pub register: RateRule,
    pub authenticated: RateRule,
}

impl RateRules {
    /// Parse every configured rule; the first bad one is reported
    pub fn from_config(config: &RateLimitConfig) -> Result<Self, RateRuleError> {
        Ok(Self {
            login: config.login.parse()?,
            refresh: config.refresh.parse()?,
            forgot: config.forgot.parse()?,
            register: config.register.parse()?,
            authenticated: config.authenticated.parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rules() {
        let rule: RateRule = "10 per minute".parse().unwrap();
        assert_eq!(rule.limit.get(), 10);
        assert_eq!(rule.period, RatePeriod::Minute);
        assert_eq!(rule.window(), Duration::from_secs(60));

        let rule: RateRule = "  5 PER hours ".parse().unwrap();
        assert_eq!(rule.period, RatePeriod::Hour);
        assert_eq!(rule.to_string(), "5 per hour");
    }

    #[test]
    fn test_reject_bad_rules() {
        for bad in ["", "ten per minute", "0 per minute", "10 minute", "10 per fortnight", "10 per minute extra"] {
            assert!(bad.parse::<RateRule>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn test_rules_from_config() {
        let config = RateLimitConfig {
            login: "10 per minute".into(),
            refresh: "30 per minute".into(),
            forgot: "5 per hour".into(),
            register: "10 per hour".into(),
            authenticated: "120 per minute".into(),
        };
        let rules = RateRules::from_config(&config).unwrap();
        assert_eq!(rules.forgot.period, RatePeriod::Hour);
        assert_eq!(rules.authenticated.limit.get(), 120);

        let broken = RateLimitConfig {
            login: "lots".into(),
            ..config
        };
        assert!(RateRules::from_config(&broken).is_err());
    }
}
