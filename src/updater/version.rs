use std::cmp::Ordering;

/// Drop a leading `v` from a release tag.
pub fn strip_v(tag: &str) -> &str {
    tag.trim().strip_prefix('v').unwrap_or(tag.trim())
}

/// Compare dot-separated numeric versions. Missing segments count as zero and a
/// segment contributes only its leading digits (`"3-beta"` is 3, `"rc"` is 0).
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left = segments(a);
    let right = segments(b);
    let len = left.len().max(right.len());
    (0..len)
        .map(|i| {
            let l = left.get(i).copied().unwrap_or(0);
            let r = right.get(i).copied().unwrap_or(0);
            l.cmp(&r)
        })
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

fn segments(version: &str) -> Vec<u64> {
    strip_v(version)
        .split('.')
        .map(|part| {
            let digits: String = part.chars().take_while(char::is_ascii_digit).collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orders_numeric_segments() {
        assert_eq!(compare_versions("1.0.0", "1.0.1"), Ordering::Less);
        assert_eq!(compare_versions("1.2", "1.2.0"), Ordering::Equal);
        assert_eq!(compare_versions("2.0.0", "1.9.9"), Ordering::Greater);
        assert_eq!(compare_versions("1.10.0", "1.9.0"), Ordering::Greater);
    }

    #[test]
    fn tolerates_prefixes_and_suffixes() {
        assert_eq!(strip_v("v1.2.3"), "1.2.3");
        assert_eq!(strip_v("1.2.3"), "1.2.3");
        assert_eq!(compare_versions("v1.0.1", "1.0.1"), Ordering::Equal);
        assert_eq!(compare_versions("1.0.1-beta", "1.0.1"), Ordering::Equal);
        assert_eq!(compare_versions("1.x", "1.0"), Ordering::Equal);
    }
}
