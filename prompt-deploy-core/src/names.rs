//! Syntax checks for object-store addressing: bucket names, key prefixes and regions.

use std::sync::OnceLock;

use regex::Regex;

/// Regions the pipeline is allowed to talk to.
pub const ALLOWED_REGIONS: &[&str] = &[
    "us-east-1",
    "us-east-2",
    "us-west-1",
    "us-west-2",
    "eu-west-1",
    "eu-west-2",
    "eu-central-1",
    "ap-southeast-1",
    "ap-southeast-2",
    "ap-northeast-1",
];

fn bucket_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9][a-z0-9.-]{1,61}[a-z0-9]$").expect("bucket name pattern is valid")
    })
}

fn prefix_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9/_-]*$").expect("prefix pattern is valid"))
}

/// 3-63 chars of lowercase letters, digits, dots and hyphens, alphanumeric at both
/// ends, and no `..`, `.-` or `-.` sequences.
pub fn is_valid_bucket_name(name: &str) -> bool {
    if !bucket_pattern().is_match(name) {
        return false;
    }
    !(name.contains("..") || name.contains(".-") || name.contains("-."))
}

/// Empty, or relative and made of `[a-zA-Z0-9/_-]` with no `..`.
pub fn is_valid_prefix(prefix: &str) -> bool {
    if prefix.contains("..") || prefix.starts_with('/') {
        return false;
    }
    prefix_pattern().is_match(prefix)
}

pub fn is_allowed_region(region: &str) -> bool {
    ALLOWED_REGIONS.contains(&region)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_bucket_names() {
        for name in [
            "my-bucket",
            "my.bucket.123",
            "a-b-c",
            "test-bucket-2024",
            "abc",
        ] {
            assert!(is_valid_bucket_name(name), "should be valid: {name}");
        }
        assert!(is_valid_bucket_name(&"a".repeat(63)));
    }

    #[test]
    fn invalid_bucket_names() {
        for name in [
            "My-Bucket",
            "my_bucket",
            "a",
            "ab",
            "-bucket",
            "bucket-",
            "bucket..name",
            "bucket.-name",
            "bucket-.name",
            "",
        ] {
            assert!(!is_valid_bucket_name(name), "should be invalid: {name}");
        }
        assert!(!is_valid_bucket_name(&"a".repeat(64)));
    }

    #[test]
    fn valid_prefixes() {
        for prefix in ["beta/", "prod/", "test/outputs/", "a-b-c/", "snake_case", ""] {
            assert!(is_valid_prefix(prefix), "should be valid: {prefix:?}");
        }
    }

    #[test]
    fn invalid_prefixes() {
        for prefix in ["../etc/", "/absolute/", "test/../prod/", "with space/", "dot.ted/"] {
            assert!(!is_valid_prefix(prefix), "should be invalid: {prefix:?}");
        }
    }

    #[test]
    fn regions() {
        assert!(is_allowed_region("us-east-1"));
        assert!(is_allowed_region("eu-central-1"));
        assert!(!is_allowed_region("invalid-region"));
        assert!(!is_allowed_region("US-EAST-1"));
    }
}
