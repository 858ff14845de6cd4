//! Member visibility and lookup binding flags

use std::fmt;

/// Declared visibility of a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Visibility {
    /// Visible to everyone
    #[default]
    Public,
    /// Visible to the declaring type and its subclasses
    Protected,
    /// Visible to the declaring type only
    Private,
}

/// Lookup binding flags (bitflags)
///
/// A member matches when its visibility is admitted (`PUBLIC` or
/// `NON_PUBLIC`) and its storage is admitted (`INSTANCE` or `STATIC`).
/// Flags with neither storage bit match nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BindingFlags(u8);

impl BindingFlags {
    /// Matches nothing
    pub const NONE: Self = Self(0x00);
    /// Public members
    pub const PUBLIC: Self = Self(0x01);
    /// Protected and private members
    pub const NON_PUBLIC: Self = Self(0x02);
    /// Instance members
    pub const INSTANCE: Self = Self(0x04);
    /// Static members
    pub const STATIC: Self = Self(0x08);
    /// Do not search base types
    pub const DECLARED_ONLY: Self = Self(0x10);

    // Common combinations
    /// PUBLIC | INSTANCE | STATIC
    pub const DEFAULT: Self = Self(0x0D);
    /// PUBLIC | NON_PUBLIC | INSTANCE
    pub const ALL_INSTANCE: Self = Self(0x07);
    /// PUBLIC | NON_PUBLIC | STATIC
    pub const ALL_STATIC: Self = Self(0x0B);
    /// PUBLIC | NON_PUBLIC | INSTANCE | STATIC
    pub const ALL: Self = Self(0x0F);

    /// Create from raw bits
    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Get raw bits
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Check if all flags in `other` are set
    pub const fn contains(&self, other: Self) -> bool {
        (self.0 & other.0) == other.0
    }

    /// Union of flags
    pub const fn union(&self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Remove flags
    pub const fn difference(&self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Whether a member with the given shape is visible under these flags.
    ///
    /// `inherited` is true when the member is declared on a base type of the
    /// type being searched; private members of base types are never visible.
    pub fn admits(&self, visibility: Visibility, is_static: bool, inherited: bool) -> bool {
        let visible = match visibility {
            Visibility::Public => self.contains(Self::PUBLIC),
            Visibility::Protected | Visibility::Private => self.contains(Self::NON_PUBLIC),
        };
        let storage = if is_static {
            self.contains(Self::STATIC)
        } else {
            self.contains(Self::INSTANCE)
        };
        visible && storage && !(inherited && visibility == Visibility::Private)
    }

    /// Parse a single flag name or a `|`-separated list of names
    pub fn parse(s: &str) -> Option<Self> {
        let mut flags = Self::NONE;
        for part in s.split('|') {
            let part = part.trim();
            let flag = match part.to_uppercase().as_str() {
                "NONE" => Self::NONE,
                "PUBLIC" => Self::PUBLIC,
                "NON_PUBLIC" | "NONPUBLIC" => Self::NON_PUBLIC,
                "INSTANCE" => Self::INSTANCE,
                "STATIC" => Self::STATIC,
                "DECLARED_ONLY" => Self::DECLARED_ONLY,
                "DEFAULT" => Self::DEFAULT,
                "ALL_INSTANCE" => Self::ALL_INSTANCE,
                "ALL_STATIC" => Self::ALL_STATIC,
                "ALL" => Self::ALL,
                _ => {
                    if let Some(hex) = part.strip_prefix("0x") {
                        u8::from_str_radix(hex, 16).ok().map(Self::from_bits)?
                    } else {
                        part.parse::<u8>().ok().map(Self::from_bits)?
                    }
                }
            };
            flags = flags.union(flag);
        }
        Some(flags)
    }
}

impl Default for BindingFlags {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::ops::BitOr for BindingFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Display for BindingFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(BindingFlags, &str); 5] = [
            (BindingFlags::PUBLIC, "PUBLIC"),
            (BindingFlags::NON_PUBLIC, "NON_PUBLIC"),
            (BindingFlags::INSTANCE, "INSTANCE"),
            (BindingFlags::STATIC, "STATIC"),
            (BindingFlags::DECLARED_ONLY, "DECLARED_ONLY"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            f.write_str("NONE")
        } else {
            f.write_str(&names.join(" | "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combinations() {
        assert!(BindingFlags::ALL.contains(BindingFlags::NON_PUBLIC));
        assert!(BindingFlags::ALL.contains(BindingFlags::STATIC));
        assert!(!BindingFlags::DEFAULT.contains(BindingFlags::NON_PUBLIC));
        assert_eq!(
            BindingFlags::PUBLIC | BindingFlags::INSTANCE,
            BindingFlags::from_bits(0x05)
        );
        assert_eq!(
            BindingFlags::ALL.difference(BindingFlags::STATIC),
            BindingFlags::ALL_INSTANCE
        );
    }

    #[test]
    fn test_admits() {
        let public_instance = BindingFlags::PUBLIC | BindingFlags::INSTANCE;
        assert!(public_instance.admits(Visibility::Public, false, false));
        assert!(!public_instance.admits(Visibility::Private, false, false));
        assert!(!public_instance.admits(Visibility::Public, true, false));

        assert!(BindingFlags::ALL.admits(Visibility::Private, false, false));
        assert!(BindingFlags::ALL.admits(Visibility::Protected, false, true));
        assert!(!BindingFlags::ALL.admits(Visibility::Private, false, true));

        // No storage bits, nothing matches
        assert!(!BindingFlags::PUBLIC.admits(Visibility::Public, false, false));
    }

    #[test]
    fn test_parse() {
        assert_eq!(BindingFlags::parse("PUBLIC"), Some(BindingFlags::PUBLIC));
        assert_eq!(
            BindingFlags::parse("public | non_public | instance"),
            Some(BindingFlags::ALL_INSTANCE)
        );
        assert_eq!(BindingFlags::parse("ALL"), Some(BindingFlags::ALL));
        assert_eq!(BindingFlags::parse("0x0F"), Some(BindingFlags::ALL));
        assert_eq!(BindingFlags::parse("12"), Some(BindingFlags::from_bits(12)));
        assert_eq!(BindingFlags::parse("SOMETIMES"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(BindingFlags::NONE.to_string(), "NONE");
        assert_eq!(
            BindingFlags::ALL_INSTANCE.to_string(),
            "PUBLIC | NON_PUBLIC | INSTANCE"
        );
    }
}
