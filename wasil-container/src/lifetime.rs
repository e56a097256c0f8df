//! Service lifetimes.
//!
//! A lifetime decides how long a constructed instance is reused:
//! - [`Lifetime::Singleton`]: one instance for the provider's whole life
//! - [`Lifetime::Scoped`]: one instance per [`Scope`](crate::scope::Scope)
//! - [`Lifetime::Transient`]: a fresh instance on every resolve
//!
//! # Ordering
//! Lifetimes order by how long they live: `Singleton > Scoped > Transient`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How long a resolved instance is reused.
///
/// # Examples
/// ```
/// use wasil_container::lifetime::Lifetime;
///
/// assert!(Lifetime::Singleton > Lifetime::Scoped);
/// assert!(Lifetime::Scoped > Lifetime::Transient);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifetime {
    /// Built once, cached in the provider, shared by every scope.
    Singleton,

    /// Built once per scope and torn down with it.
    ///
    /// Resolving a scoped service straight from the provider is an error.
    Scoped,

    /// Never cached.
    Transient,
}

impl Lifetime {
    /// Singleton and Scoped cache their instances; Transient does not.
    #[inline]
    pub fn is_cached(&self) -> bool {
        matches!(self, Lifetime::Singleton | Lifetime::Scoped)
    }

    /// Returns `true` if holding an instance of this lifetime inside a
    /// singleton would keep it alive past its intended life.
    #[inline]
    pub fn is_captive_in_singleton(&self) -> bool {
        !matches!(self, Lifetime::Singleton)
    }

    #[inline]
    fn rank(&self) -> u8 {
        match self {
            Lifetime::Singleton => 2,
            Lifetime::Scoped => 1,
            Lifetime::Transient => 0,
        }
    }

    /// Bit used by the validator's captured-lifetime sets.
    #[inline]
    pub(crate) fn bit(&self) -> u8 {
        1 << self.rank()
    }

    pub(crate) const ALL: [Lifetime; 3] = [Lifetime::Singleton, Lifetime::Scoped, Lifetime::Transient];
}

impl PartialOrd for Lifetime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Lifetime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lifetime::Singleton => write!(f, "Singleton"),
            Lifetime::Scoped => write!(f, "Scoped"),
            Lifetime::Transient => write!(f, "Transient"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering() {
        assert!(Lifetime::Singleton > Lifetime::Scoped);
        assert!(Lifetime::Scoped > Lifetime::Transient);
        assert!(Lifetime::Singleton > Lifetime::Transient);
    }

    #[test]
    fn caching() {
        assert!(Lifetime::Singleton.is_cached());
        assert!(Lifetime::Scoped.is_cached());
        assert!(!Lifetime::Transient.is_cached());
    }

    #[test]
    fn captive() {
        assert!(!Lifetime::Singleton.is_captive_in_singleton());
        assert!(Lifetime::Scoped.is_captive_in_singleton());
        assert!(Lifetime::Transient.is_captive_in_singleton());
    }

    #[test]
    fn distinct_bits() {
        let bits: u8 = Lifetime::ALL.iter().fold(0, |acc, l| acc | l.bit());
        assert_eq!(bits.count_ones(), 3);
    }

    #[test]
    fn display_and_serde() {
        assert_eq!(Lifetime::Scoped.to_string(), "Scoped");
        let json = serde_json::to_string(&Lifetime::Transient).unwrap();
        assert_eq!(json, "\"transient\"");
        let back: Lifetime = serde_json::from_str("\"singleton\"").unwrap();
        assert_eq!(back, Lifetime::Singleton);
    }
}
