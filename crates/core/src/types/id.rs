//! Resource identifiers.
//!
//! The API numbers every resource with a positive integer. Each kind gets its
//! own type so a cart line cannot confuse a product with an offer.

/// Error returned when text is not a valid resource ID.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind} id: {input:?} (expected a positive integer)")]
pub struct ParseIdError {
    /// Which resource the ID was meant for.
    pub kind: &'static str,
    /// The rejected text.
    pub input: String,
}

/// Declare an ID type for the resource named `$kind`.
///
/// The type is `Copy`, ordered and hashable, serializes as a bare number and
/// parses from text (surrounding whitespace allowed, zero and negatives
/// rejected).
///
/// ```rust
/// # use crumb_core::define_id;
/// define_id!(TrayId, "tray");
///
/// let tray: TrayId = " 12 ".parse().unwrap();
/// assert_eq!(tray.get(), 12);
/// assert!("0".parse::<TrayId>().is_err());
/// ```
#[macro_export]
macro_rules! define_id {
    ($name:ident, $kind:literal) => {
        #[doc = concat!("Identifier of a ", $kind, ".")]
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Name of the resource, for messages.
            pub const KIND: &'static str = $kind;

            #[must_use]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                ::core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::types::id::ParseIdError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                match s.trim().parse::<i64>() {
                    Ok(id) if id > 0 => Ok(Self(id)),
                    _ => Err($crate::types::id::ParseIdError {
                        kind: $kind,
                        input: s.to_owned(),
                    }),
                }
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

define_id!(UserId, "user");
define_id!(ProductId, "product");
define_id!(OfferId, "offer");
define_id!(OrderId, "order");
define_id!(BranchId, "branch");

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format_is_a_bare_number() {
        assert_eq!(serde_json::to_string(&ProductId::new(42)).unwrap(), "42");
        let parsed: OfferId = serde_json::from_str("9").unwrap();
        assert_eq!(parsed, OfferId::new(9));
    }

    #[test]
    fn test_parse_accepts_only_positive_numbers() {
        assert_eq!(" 7 ".parse::<OrderId>().unwrap().get(), 7);

        let err = "seven".parse::<OrderId>().unwrap_err();
        assert_eq!(err.kind, "order");
        assert!("0".parse::<BranchId>().is_err());
        assert!("-3".parse::<UserId>().is_err());
    }

    #[test]
    fn test_display_and_kind() {
        assert_eq!(format!("#{}", BranchId::new(3)), "#3");
        assert_eq!(ProductId::KIND, "product");
    }
}
