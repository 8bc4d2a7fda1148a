// src/version.rs

//! Package version comparison
//!
//! Implements the `[epoch:]version[-release]` ordering used everywhere a
//! package version is compared: upgrade detection, newest-candidate
//! selection and versioned dependency matching. The segment comparison
//! follows the classic RPM rules and must not be "improved": repositories
//! in the wild depend on the exact ordering, warts included.

use std::cmp::Ordering;

/// Compare two version fragments using RPM-style segment rules.
///
/// Each string is walked as alternating runs of digits and letters,
/// ignoring separator characters. Digit runs compare numerically (leading
/// zeros stripped, longer run wins), letter runs compare lexically, and a
/// digit run is always newer than a letter run.
pub fn vercmp(a: &str, b: &str) -> Ordering {
    // trivial optimisation
    if a == b {
        return Ordering::Equal;
    }

    let one = a.as_bytes();
    let two = b.as_bytes();
    let mut i = 0;
    let mut j = 0;

    while i < one.len() || j < two.len() {
        // skip anything that is not alphanumeric
        while i < one.len() && !one[i].is_ascii_alphanumeric() {
            i += 1;
        }
        while j < two.len() && !two[j].is_ascii_alphanumeric() {
            j += 1;
        }
        if i >= one.len() || j >= two.len() {
            break;
        }

        // grab the next segment of the same character class
        let isnum = one[i].is_ascii_digit();
        let start_one = i;
        let start_two = j;
        if isnum {
            while i < one.len() && one[i].is_ascii_digit() {
                i += 1;
            }
            while j < two.len() && two[j].is_ascii_digit() {
                j += 1;
            }
        } else {
            while i < one.len() && one[i].is_ascii_alphabetic() {
                i += 1;
            }
            while j < two.len() && two[j].is_ascii_alphabetic() {
                j += 1;
            }
        }

        let seg_one = &a[start_one..i];
        let seg_two = &b[start_two..j];

        // the segments are different types: the numeric one is newer
        if seg_two.is_empty() {
            return if isnum {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        let ord = if isnum {
            let trim_one = seg_one.trim_start_matches('0');
            let trim_two = seg_two.trim_start_matches('0');
            // more digits means a bigger number
            trim_one
                .len()
                .cmp(&trim_two.len())
                .then_with(|| trim_one.cmp(trim_two))
        } else {
            seg_one.cmp(seg_two)
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    // whichever side still has a segment left is newer; trailing
    // separators have already been consumed and do not count
    match (i >= one.len(), j >= two.len()) {
        (true, true) => Ordering::Equal,
        (false, _) => Ordering::Greater,
        _ => Ordering::Less,
    }
}

/// Split an `[epoch:]version[-release]` string into its three parts.
fn split_evr(evr: &str) -> (Option<&str>, &str, Option<&str>) {
    let (epoch, rest) = match evr.split_once(':') {
        Some((e, r)) => (Some(e), r),
        None => (None, evr),
    };
    let (version, release) = match rest.rsplit_once('-') {
        Some((v, r)) => (v, Some(r)),
        None => (rest, None),
    };
    (epoch, version, release)
}

/// Parse an epoch with C `atol` semantics: leading digits only, anything
/// unparseable is zero.
fn epoch_value(epoch: &str) -> i64 {
    let digits: String = epoch
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().unwrap_or(0)
}

/// Compare two `[epoch:]version[-release]` strings.
///
/// The epoch is compared first when both sides carry one. When only one
/// side has an epoch, that side wins only if the epoch parses to a
/// positive integer; this asymmetric rule matches the legacy engine and
/// upgrade correctness depends on keeping it.
pub fn compare_evr(a: &str, b: &str) -> Ordering {
    // exactly the same, optimise
    if a == b {
        return Ordering::Equal;
    }

    let (a_epoch, a_version, a_release) = split_evr(a);
    let (b_epoch, b_version, b_release) = split_evr(b);

    // compare epoch
    match (a_epoch, b_epoch) {
        (Some(ae), Some(be)) => {
            let ord = vercmp(ae, be);
            if ord != Ordering::Equal {
                return ord;
            }
        }
        (Some(ae), None) if epoch_value(ae) > 0 => return Ordering::Greater,
        (None, Some(be)) if epoch_value(be) > 0 => return Ordering::Less,
        _ => {}
    }

    // compare version
    let ord = vercmp(a_version, b_version);
    if ord != Ordering::Equal {
        return ord;
    }

    // compare release
    if let (Some(ar), Some(br)) = (a_release, b_release) {
        return vercmp(ar, br);
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vercmp_numeric() {
        assert_eq!(vercmp("1.0", "1.0"), Ordering::Equal);
        assert_eq!(vercmp("1.0", "1.1"), Ordering::Less);
        assert_eq!(vercmp("2.0", "1.9"), Ordering::Greater);
        assert_eq!(vercmp("10", "9"), Ordering::Greater);
        assert_eq!(vercmp("010", "10"), Ordering::Equal);
        assert_eq!(vercmp("1.05", "1.5"), Ordering::Equal);
    }

    #[test]
    fn test_vercmp_alpha() {
        assert_eq!(vercmp("a", "b"), Ordering::Less);
        assert_eq!(vercmp("alpha", "beta"), Ordering::Less);
        assert_eq!(vercmp("1.0a", "1.0b"), Ordering::Less);
        // numeric segments beat alpha segments
        assert_eq!(vercmp("1.0", "1.a"), Ordering::Greater);
        assert_eq!(vercmp("1.a", "1.0"), Ordering::Less);
    }

    #[test]
    fn test_vercmp_segments() {
        // an extra segment makes the longer side newer
        assert_eq!(vercmp("1.0.1", "1.0"), Ordering::Greater);
        assert_eq!(vercmp("1.0", "1.0.1"), Ordering::Less);
        // trailing separators do not count as a segment
        assert_eq!(vercmp("1.0.", "1.0"), Ordering::Equal);
        assert_eq!(vercmp("1..0", "1.0"), Ordering::Equal);
    }

    #[test]
    fn test_compare_evr_equal() {
        assert_eq!(compare_evr("1:1.0.2-3", "1:1.0.2-3"), Ordering::Equal);
        assert_eq!(compare_evr("1.0.2-3", "1.0.2-3"), Ordering::Equal);
    }

    #[test]
    fn test_compare_evr_release() {
        assert_eq!(compare_evr("1:1.0.2-3", "1:1.0.2-4"), Ordering::Less);
        assert_eq!(compare_evr("1:1.0.2-4", "1:1.0.2-3"), Ordering::Greater);
        assert_eq!(compare_evr("1.0.2-1", "1.0.1-1"), Ordering::Greater);
        // a missing release on either side is not compared
        assert_eq!(compare_evr("1.0.2", "1.0.2-9"), Ordering::Equal);
    }

    #[test]
    fn test_compare_evr_epoch() {
        // epoch beats version, even when the version is older
        assert_eq!(compare_evr("1:0.0.1-1", "1.0.2-2"), Ordering::Greater);
        assert_eq!(compare_evr("1.0.2-2", "1:0.0.1-1"), Ordering::Less);
        assert_eq!(compare_evr("2:1.0-1", "1:2.0-1"), Ordering::Greater);
        // a zero epoch does not outrank a missing one
        assert_eq!(compare_evr("0:1.0-1", "1.0-1"), Ordering::Equal);
    }
}
