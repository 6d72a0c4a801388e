//! Backend key layout.
//!
//! All limiter keys are prefixed `throttled:v1:<algorithm_id>:<caller_key>`.
//! Window algorithms append a `:period:<period_index>` suffix on top of this
//! base key. Changing the prefix is a breaking change for anyone with existing
//! state in a remote backend.

/// Stable key-space prefix. Bumping the version segment is a breaking change.
pub(crate) const KEY_PREFIX: &str = "throttled:v1:";

/// Build the backend key for `caller_key` under `algorithm_id`.
pub(crate) fn prepare_key(algorithm_id: &str, caller_key: &str) -> String {
    format!("{KEY_PREFIX}{algorithm_id}:{caller_key}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_with_version_and_algorithm() {
        assert_eq!(
            prepare_key("gcra", "user:42"),
            "throttled:v1:gcra:user:42"
        );
    }
}
