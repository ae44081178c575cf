//! Strongly-typed string wrappers for game concepts

use deunicode::deunicode;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                $name(s.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }
    };
}

string_newtype!(
    /// Card subtype (creature type, land type, "Aura", "Equipment", ...)
    Subtype
);

string_newtype!(
    /// Counter kind placed on a permanent (e.g. "+1/+1", "loyalty", "charge")
    CounterType
);

string_newtype!(
    /// Printed card name
    CardName
);

string_newtype!(PlayerName);

impl CounterType {
    pub fn plus_one() -> Self {
        CounterType::new("+1/+1")
    }

    pub fn minus_one() -> Self {
        CounterType::new("-1/-1")
    }

    pub fn loyalty() -> Self {
        CounterType::new("loyalty")
    }

    pub fn is_plus_one(&self) -> bool {
        self.0 == "+1/+1"
    }

    pub fn is_minus_one(&self) -> bool {
        self.0 == "-1/-1"
    }
}

impl CardName {
    /// Lookup key: ASCII-folded, lowercase, trimmed ("Æther Vial" -> "aether vial")
    pub fn normalized(&self) -> String {
        normalize_name(&self.0)
    }
}

/// Normalize a card name for registry lookups
pub fn normalize_name(name: &str) -> String {
    deunicode(name.trim()).to_lowercase()
}
