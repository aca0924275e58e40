// SPDX-License-Identifier: MIT

//! Collision-resistant opaque id generation shared by every entity in the
//! data model (`Message`, `Task`, `Team`, `ConsensusProposal`,
//! `WorkflowDefinition`, `WorkflowInstance`, `Snapshot`, `Event`, ...).

/// Define a newtype id wrapper with a short type prefix and a random suffix.
///
/// The wire format is `{prefix}{nanoid}`, e.g. `task_V1StGXR8_Z5jdHi6B-myT`.
/// Prefixes make ids self-describing in logs without a lookup.
#[macro_export]
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($prefix:literal);
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub smol_str::SmolStr);

        impl $name {
            pub const PREFIX: &'static str = $prefix;

            /// Generate a new random id with the type prefix.
            pub fn new() -> Self {
                Self(smol_str::SmolStr::new(format!("{}{}", Self::PREFIX, nanoid::nanoid!(21))))
            }

            /// Wrap an existing string (parsing, deserialization, tests).
            pub fn from_string(id: impl AsRef<str>) -> Self {
                Self(smol_str::SmolStr::new(id.as_ref()))
            }

            pub fn as_str(&self) -> &str {
                self.0.as_str()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::from_string(s)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self::from_string(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                self.0.as_str()
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                self.0.as_str()
            }
        }
    };
}

/// Deterministic id generator for reproducible tests: returns
/// `{prefix}{counter}` instead of a random suffix.
#[cfg(any(test, feature = "test-support"))]
#[derive(Default)]
pub struct FakeIdGen {
    counter: std::sync::atomic::AtomicU64,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeIdGen {
    pub fn next(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        format!("{prefix}{n:06}")
    }
}
