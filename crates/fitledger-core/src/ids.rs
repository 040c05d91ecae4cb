//! Identifier types for fitledger.
//!
//! Row identifiers handed to the core by the surrounding CRUD handlers are
//! positive integers. Rows the core creates itself (meal logs, check-in
//! responses) use ULIDs so they sort by creation time.
//!
//! # Macro-based ID Types
//!
//! The `int_id_type!` macro reduces boilerplate for integer identifier types,
//! ensuring consistent validation, serialization, parsing and display.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Macro to define a positive integer identifier type with standard trait implementations.
///
/// This macro generates a newtype wrapper around `i64` with implementations for:
/// - `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - `Serialize`, `Deserialize` (as a number, validated on the way in)
/// - `FromStr`, `Display`, `Debug`
/// - `TryFrom<i64>`, `Into<i64>`
///
/// # Example
///
/// ```ignore
/// int_id_type!(MyId, "A custom identifier type.");
/// let id = MyId::new(7)?;
/// let parsed: MyId = "7".parse()?;
/// ```
macro_rules! int_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "i64", into = "i64")]
        pub struct $name(i64);

        impl $name {
            /// Create an identifier, rejecting zero and negative values.
            ///
            /// # Errors
            ///
            /// Returns `IdError::NotPositive` if `value <= 0`.
            pub fn new(value: i64) -> Result<Self, IdError> {
                if value <= 0 {
                    return Err(IdError::NotPositive(value));
                }
                Ok(Self(value))
            }

            /// Return the raw integer value.
            #[must_use]
            pub const fn get(self) -> i64 {
                self.0
            }

            /// Big-endian bytes, used to build ordered storage keys.
            #[must_use]
            pub const fn to_be_bytes(self) -> [u8; 8] {
                self.0.to_be_bytes()
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = s
                    .trim()
                    .parse::<i64>()
                    .map_err(|_| IdError::NotNumeric(s.to_string()))?;
                Self::new(value)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<i64> for $name {
            type Error = IdError;

            fn try_from(value: i64) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

int_id_type!(UserId, "A user identifier.\n\nProvided by the authentication collaborator; the core never mints user ids.");
int_id_type!(RoutineItemId, "A routine item (exercise slot in a user's routine).");
int_id_type!(RecipeId, "A recipe from the content catalog.");
int_id_type!(CheckinConfigId, "An admin-authored weekly check-in configuration.");
int_id_type!(QuestionId, "A question belonging to a check-in configuration.");
int_id_type!(GroupId, "A user group or challenge group.");

/// Macro to define a ULID-based identifier for rows the core creates.
macro_rules! ulid_id_type {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(Ulid);

        impl $name {
            /// Generate a new identifier with the current timestamp.
            #[must_use]
            pub fn generate() -> Self {
                Self(Ulid::new())
            }

            /// Return the bytes of the ULID (16 bytes).
            #[must_use]
            pub fn to_bytes(&self) -> [u8; 16] {
                self.0.to_bytes()
            }

            /// Create an identifier from its 16 raw bytes.
            #[must_use]
            pub fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Ulid::from_bytes(bytes))
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let ulid = Ulid::from_string(s).map_err(|_| IdError::InvalidUlid)?;
                Ok(Self(ulid))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0.to_string()
            }
        }
    };
}

ulid_id_type!(MealLogId, "A meal diary row.\n\nTime-ordered so a day's meals list in logging order.");
ulid_id_type!(ResponseId, "A stored check-in answer.");

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The input is zero or negative.
    #[error("identifier must be positive, got {0}")]
    NotPositive(i64),

    /// The input is not an integer.
    #[error("identifier is not numeric: {0:?}")]
    NotNumeric(String),

    /// The input is not a valid ULID.
    #[error("invalid ULID format")]
    InvalidUlid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_rejects_non_positive() {
        assert_eq!(UserId::new(0), Err(IdError::NotPositive(0)));
        assert_eq!(UserId::new(-3), Err(IdError::NotPositive(-3)));
        assert_eq!(UserId::new(12).unwrap().get(), 12);
    }

    #[test]
    fn user_id_parses_from_path_segment() {
        let id: UserId = "42".parse().unwrap();
        assert_eq!(id.get(), 42);
        assert!(matches!("abc".parse::<UserId>(), Err(IdError::NotNumeric(_))));
        assert!(matches!("-1".parse::<UserId>(), Err(IdError::NotPositive(-1))));
    }

    #[test]
    fn user_id_deserialize_validates() {
        let id: UserId = serde_json::from_str("7").unwrap();
        assert_eq!(id.get(), 7);
        assert!(serde_json::from_str::<UserId>("0").is_err());
        assert_eq!(serde_json::to_string(&id).unwrap(), "7");
    }

    #[test]
    fn big_endian_bytes_preserve_order() {
        let small = RoutineItemId::new(9).unwrap();
        let large = RoutineItemId::new(300).unwrap();
        assert!(small.to_be_bytes() < large.to_be_bytes());
    }

    #[test]
    fn meal_log_id_string_form() {
        let id = MealLogId::generate();
        let parsed: MealLogId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert_eq!(MealLogId::from_bytes(id.to_bytes()), id);
        assert!("not-a-ulid".parse::<MealLogId>().is_err());
    }
}
