// src/depend.rs

//! Versioned dependency constraints
//!
//! A [`Depend`] is a named, optionally-versioned constraint. Requires,
//! provides, conflicts and obsoletes all share this shape; satisfiability
//! between two of them is what the whole resolver is built on.

use crate::error::{Error, Result};
use crate::version::compare_evr;
use std::cmp::Ordering;
use std::fmt;

/// Relational operator attached to a dependency version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependFlag {
    /// Any version of the named package satisfies the dependency
    Any,
    Less,
    LessEqual,
    Equal,
    GreaterEqual,
    Greater,
}

impl DependFlag {
    /// The operator accepts versions below the reference version
    pub fn is_less(self) -> bool {
        matches!(self, DependFlag::Less | DependFlag::LessEqual)
    }

    /// The operator accepts versions above the reference version
    pub fn is_greater(self) -> bool {
        matches!(self, DependFlag::Greater | DependFlag::GreaterEqual)
    }

    /// The operator accepts the reference version itself
    pub fn is_equal(self) -> bool {
        matches!(
            self,
            DependFlag::Equal | DependFlag::LessEqual | DependFlag::GreaterEqual
        )
    }

    /// Parse a textual operator, e.g. ">="
    pub fn parse(text: &str) -> Result<Self> {
        match text {
            "<" => Ok(DependFlag::Less),
            "<=" => Ok(DependFlag::LessEqual),
            "=" => Ok(DependFlag::Equal),
            ">=" => Ok(DependFlag::GreaterEqual),
            ">" => Ok(DependFlag::Greater),
            _ => Err(Error::Parse(format!("invalid depend operator: {}", text))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DependFlag::Any => "~",
            DependFlag::Less => "<",
            DependFlag::LessEqual => "<=",
            DependFlag::Equal => "=",
            DependFlag::GreaterEqual => ">=",
            DependFlag::Greater => ">",
        }
    }
}

/// A named, optionally-versioned dependency constraint
///
/// Immutable once constructed. The [`fmt::Display`] rendering
/// (`name OP version`, or just `name` for unversioned constraints) is the
/// canonical description used as a memoization key by [`crate::package`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Depend {
    name: String,
    flag: DependFlag,
    version: Option<String>,
}

impl Depend {
    /// Create a new versioned dependency
    pub fn new(name: &str, flag: DependFlag, version: &str) -> Self {
        Self {
            name: name.to_string(),
            flag,
            version: Some(version.to_string()),
        }
    }

    /// Create a dependency satisfied by any version of `name`
    pub fn new_any(name: &str) -> Self {
        Self {
            name: name.to_string(),
            flag: DependFlag::Any,
            version: None,
        }
    }

    /// Parse a textual description of the form `name` or `name OP version`
    pub fn parse(text: &str) -> Result<Self> {
        let sections: Vec<&str> = text.split_whitespace().collect();
        match sections.as_slice() {
            [name] => Ok(Self::new_any(name)),
            [name, op, version] => Ok(Self::new(name, DependFlag::parse(op)?, version)),
            _ => Err(Error::Parse(format!("invalid depend description: '{}'", text))),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flag(&self) -> DependFlag {
        self.flag
    }

    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// A file dependency is provided implicitly by any package owning the
    /// named path
    pub fn is_file(&self) -> bool {
        self.name.starts_with('/')
    }

    /// The rendered description, used as a cache key
    pub fn description(&self) -> String {
        self.to_string()
    }

    /// Test whether this dependency (something a package *has*) satisfies
    /// the `need` constraint.
    ///
    /// Names must match exactly. An [`DependFlag::Any`] flag on either
    /// side matches unconditionally; otherwise the two one-sided version
    /// ranges must intersect.
    pub fn satisfies(&self, need: &Depend) -> bool {
        if self.name != need.name {
            return false;
        }
        if self.flag == DependFlag::Any || need.flag == DependFlag::Any {
            return true;
        }
        let have_version = self.version.as_deref().unwrap_or("");
        let need_version = need.version.as_deref().unwrap_or("");
        match compare_evr(have_version, need_version) {
            // same version: the operators must accept a common point
            Ordering::Equal => {
                (self.flag.is_equal() && need.flag.is_equal())
                    || (self.flag.is_less() && need.flag.is_less())
                    || (self.flag.is_greater() && need.flag.is_greater())
            }
            // we have a higher version: ranges meet if ours extends down
            // or the requested one extends up
            Ordering::Greater => self.flag.is_less() || need.flag.is_greater(),
            Ordering::Less => self.flag.is_greater() || need.flag.is_less(),
        }
    }

    /// Total order by name, then by EVR of the version.
    ///
    /// Used to pick the best provider when several satisfy a requirement:
    /// the greatest-comparing depend wins.
    pub fn compare(a: &Depend, b: &Depend) -> Ordering {
        a.name.cmp(&b.name).then_with(|| {
            compare_evr(
                a.version.as_deref().unwrap_or(""),
                b.version.as_deref().unwrap_or(""),
            )
        })
    }
}

impl fmt::Display for Depend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{} {} {}", self.name, self.flag.as_str(), version),
            None => write!(f, "{}", self.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unversioned() {
        let depend = Depend::parse("hal").unwrap();
        assert_eq!(depend.name(), "hal");
        assert_eq!(depend.flag(), DependFlag::Any);
        assert!(depend.version().is_none());
        assert_eq!(depend.to_string(), "hal");
    }

    #[test]
    fn test_parse_versioned() {
        let depend = Depend::parse("hal >= 0.5.2").unwrap();
        assert_eq!(depend.name(), "hal");
        assert_eq!(depend.flag(), DependFlag::GreaterEqual);
        assert_eq!(depend.version(), Some("0.5.2"));
        assert_eq!(depend.to_string(), "hal >= 0.5.2");
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Depend::parse("").is_err());
        assert!(Depend::parse("hal >> 1.0").is_err());
        assert!(Depend::parse("hal >=").is_err());
        assert!(Depend::parse("hal >= 1.0 extra").is_err());
    }

    #[test]
    fn test_satisfies_any() {
        let need = Depend::new_any("foo");
        assert!(Depend::new("foo", DependFlag::Equal, "1.0").satisfies(&need));
        assert!(Depend::new_any("foo").satisfies(&need));
        assert!(!Depend::new("bar", DependFlag::Equal, "1.0").satisfies(&need));
    }

    #[test]
    fn test_satisfies_versioned() {
        let need = Depend::new("foo", DependFlag::Greater, "1.0");
        assert!(Depend::new("foo", DependFlag::Equal, "2.0").satisfies(&need));
        assert!(!Depend::new("foo", DependFlag::Equal, "0.5").satisfies(&need));
        assert!(!Depend::new("foo", DependFlag::Equal, "1.0").satisfies(&need));

        let need = Depend::new("foo", DependFlag::GreaterEqual, "1.0");
        assert!(Depend::new("foo", DependFlag::Equal, "1.0").satisfies(&need));

        // range intersection with a ranged provide
        let need = Depend::new("foo", DependFlag::Equal, "1.0");
        assert!(Depend::new("foo", DependFlag::LessEqual, "2.0").satisfies(&need));
        assert!(!Depend::new("foo", DependFlag::Greater, "2.0").satisfies(&need));
    }

    #[test]
    fn test_file_depend() {
        assert!(Depend::new_any("/usr/bin/hal").is_file());
        assert!(!Depend::new_any("hal").is_file());
    }

    #[test]
    fn test_compare() {
        let a = Depend::new("foo", DependFlag::Equal, "1.0");
        let b = Depend::new("foo", DependFlag::Equal, "2.0");
        assert_eq!(Depend::compare(&a, &b), Ordering::Less);
        assert_eq!(Depend::compare(&b, &a), Ordering::Greater);
        assert_eq!(Depend::compare(&a, &a), Ordering::Equal);
    }
}
