// src/arch.rs

//! Architecture compatibility
//!
//! A small fixed table of architecture families used when filtering
//! package candidates: a package is installable when its arch is in the
//! same family as the root arch (i586 can take i386 packages, but never
//! x86_64 ones). "noarch" is handled by the callers, not here.

/// The 32-bit x86 family, mutually compatible
const FAMILY_X86: &[&str] = &["i386", "i486", "i586", "i686"];

/// The 32-bit ARM family, mutually compatible
const FAMILY_ARM: &[&str] = &["arm", "armv5tel", "armv6l", "armv7l", "armv7hl"];

/// Check whether a package of arch `test` is installable on a system of
/// arch `root`.
pub fn arch_is_compatible(root: &str, test: &str) -> bool {
    if root == test {
        return true;
    }
    if FAMILY_X86.contains(&root) && FAMILY_X86.contains(&test) {
        return true;
    }
    if FAMILY_ARM.contains(&root) && FAMILY_ARM.contains(&test) {
        return true;
    }
    false
}

/// Check whether an architecture is a 64-bit one.
pub fn arch_is_64bit(arch: &str) -> bool {
    matches!(arch, "x86_64" | "aarch64" | "ppc64" | "ppc64le" | "s390x" | "riscv64")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_arch() {
        assert!(arch_is_compatible("x86_64", "x86_64"));
        assert!(arch_is_compatible("i386", "i386"));
    }

    #[test]
    fn test_x86_family() {
        assert!(arch_is_compatible("i586", "i386"));
        assert!(arch_is_compatible("i686", "i586"));
        assert!(!arch_is_compatible("i586", "x86_64"));
        assert!(!arch_is_compatible("x86_64", "i686"));
    }

    #[test]
    fn test_unrelated() {
        assert!(!arch_is_compatible("x86_64", "aarch64"));
        assert!(!arch_is_compatible("ppc64", "ppc"));
    }

    #[test]
    fn test_64bit() {
        assert!(arch_is_64bit("x86_64"));
        assert!(arch_is_64bit("aarch64"));
        assert!(!arch_is_64bit("i686"));
        assert!(!arch_is_64bit("noarch"));
    }
}
