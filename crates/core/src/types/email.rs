//! Login email addresses.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Why a string was not accepted as an [`Email`].
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailError {
    #[error("email is empty")]
    Empty,
    #[error("email is longer than {} characters", Email::MAX_LENGTH)]
    TooLong,
    #[error("email must look like name@domain")]
    Malformed,
    #[error("email domain must look like crumb.test")]
    BadDomain,
}

/// An account's email address, trimmed and lowercased.
///
/// Logins compare addresses case-insensitively, so the normalized form is
/// the only one stored. The checks are shallow on purpose: the API decides
/// whether an address is really usable.
///
/// ```
/// use crumb_core::Email;
///
/// let email = Email::parse("  Ana@Panaderia.com ").unwrap();
/// assert_eq!(email.as_str(), "ana@panaderia.com");
/// assert_eq!(email.local_part(), "ana");
/// assert!(Email::parse("ana@localhost").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// RFC 5321 limit.
    pub const MAX_LENGTH: usize = 254;

    /// Normalize and check `raw`.
    ///
    /// # Errors
    ///
    /// Returns the first [`EmailError`] that applies.
    pub fn parse(raw: &str) -> Result<Self, EmailError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(EmailError::Empty);
        }
        if trimmed.chars().count() > Self::MAX_LENGTH {
            return Err(EmailError::TooLong);
        }

        let (local, domain) = trimmed.split_once('@').ok_or(EmailError::Malformed)?;
        if local.is_empty() || domain.is_empty() || domain.contains('@') {
            return Err(EmailError::Malformed);
        }
        let labels_ok = domain.split('.').all(|label| !label.is_empty());
        if !domain.contains('.') || !labels_ok {
            return Err(EmailError::BadDomain);
        }

        Ok(Self(trimmed.to_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The part before the `@`, used as a fallback display name.
    #[must_use]
    pub fn local_part(&self) -> &str {
        self.0.split_once('@').map_or(self.0.as_str(), |(local, _)| local)
    }
}

impl fmt::Display for Email {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Email {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for Email {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_normalizes_case_and_whitespace() {
        let email = Email::parse(" Rosa.Diaz+horno@Crumb.TEST\n").unwrap();
        assert_eq!(email.as_str(), "rosa.diaz+horno@crumb.test");
        assert_eq!(email.local_part(), "rosa.diaz+horno");
        assert_eq!(email, "ROSA.DIAZ+HORNO@crumb.test".parse().unwrap());
    }

    #[test]
    fn test_rejects_malformed_addresses() {
        for (input, expected) in [
            ("  ", EmailError::Empty),
            ("ana", EmailError::Malformed),
            ("@crumb.test", EmailError::Malformed),
            ("ana@", EmailError::Malformed),
            ("ana@pan@crumb.test", EmailError::Malformed),
            ("ana@localhost", EmailError::BadDomain),
            ("ana@.crumb", EmailError::BadDomain),
            ("ana@crumb.", EmailError::BadDomain),
        ] {
            assert_eq!(Email::parse(input), Err(expected), "{input:?}");
        }
        let long = format!("{}@crumb.test", "x".repeat(250));
        assert_eq!(Email::parse(&long), Err(EmailError::TooLong));
    }

    #[test]
    fn test_deserializing_checks_the_address() {
        let email: Email = serde_json::from_str(r#""Caja1@Crumb.test""#).unwrap();
        assert_eq!(email.as_str(), "caja1@crumb.test");
        assert!(serde_json::from_str::<Email>(r#""caja1""#).is_err());
    }
}
