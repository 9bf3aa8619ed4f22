//! `bazel_compatibility` constraint evaluation (§6).
//!
//! Normalizes a target Bazel version by stripping any prerelease/build
//! suffix and keeping the first three dotted numeric components, then
//! evaluates each `(>=|<=|>|<|-)X.Y.Z` constraint against it.

const OPS: &[&str] = &[">=", "<=", ">", "<", "-"];

/// `X.Y.Z` after stripping everything from the first `-` or `+` onward.
fn normalize_bazel_version(version: &str) -> Option<(u64, u64, u64)> {
    let stripped = version.split(['-', '+']).next().unwrap_or(version);
    let mut parts = stripped.splitn(3, '.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next().unwrap_or("0").parse().ok()?;
    let patch = parts.next().unwrap_or("0").parse().ok()?;
    Some((major, minor, patch))
}

fn parse_constraint(raw: &str) -> Option<(&str, (u64, u64, u64))> {
    for op in OPS {
        if let Some(rest) = raw.strip_prefix(op) {
            let mut parts = rest.splitn(3, '.');
            let major = parts.next()?.parse().ok()?;
            let minor = parts.next()?.parse().ok()?;
            let patch = parts.next()?.parse().ok()?;
            return Some((*op, (major, minor, patch)));
        }
    }
    None
}

/// Evaluate `constraints` against `bazel_version`. Returns `(compatible,
/// reason)`; `reason` joins the failing constraints with `" and "`.
///
/// A `bazel_version` that fails to normalize is treated as compatible
/// (fail-open, consistent with the engine's other optional checks).
pub fn check_compatibility(constraints: &[String], bazel_version: &str) -> (bool, Option<String>) {
    let Some(target) = normalize_bazel_version(bazel_version) else {
        return (true, None);
    };

    let failing: Vec<String> = constraints
        .iter()
        .filter(|raw| {
            let Some((op, v)) = parse_constraint(raw) else {
                return false;
            };
            let holds = match op {
                ">=" => target >= v,
                "<=" => target <= v,
                ">" => target > v,
                "<" => target < v,
                "-" => target != v,
                _ => true,
            };
            !holds
        })
        .cloned()
        .collect();

    if failing.is_empty() {
        (true, None)
    } else {
        (false, Some(failing.join(" and ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_constraints_hold() {
        let (ok, reason) = check_compatibility(&[">=6.0.0".to_string(), "<8.0.0".to_string()], "7.1.0");
        assert!(ok);
        assert!(reason.is_none());
    }

    #[test]
    fn exclusion_constraint_fails() {
        let (ok, reason) = check_compatibility(&["-7.1.0".to_string()], "7.1.0");
        assert!(!ok);
        assert_eq!(reason.unwrap(), "-7.1.0");
    }

    #[test]
    fn prerelease_suffix_stripped_before_compare() {
        let (ok, _) = check_compatibility(&[">=7.0.0".to_string()], "7.1.0-rc1");
        assert!(ok);
    }

    #[test]
    fn multiple_failures_joined() {
        let (ok, reason) = check_compatibility(&[">=8.0.0".to_string(), "<1.0.0".to_string()], "7.1.0");
        assert!(!ok);
        assert_eq!(reason.unwrap(), ">=8.0.0 and <1.0.0");
    }

    #[test]
    fn malformed_bazel_version_fails_open() {
        let (ok, _) = check_compatibility(&["-1.0.0".to_string()], "not-a-version");
        assert!(ok);
    }
}
