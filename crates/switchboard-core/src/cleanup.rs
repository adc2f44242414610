// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Best-effort cleanup reporting.

use std::fmt::Display;

/// Logs a failed cleanup step and carries on.
///
/// Deregistration, provider disposal and contact updates must never fail
/// the request that triggered them. Routing them through here keeps the
/// attempt visible in the logs.
pub fn log_and_continue<T, E: Display>(op: &'static str, result: Result<T, E>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(op, error = %e, "cleanup step failed, continuing");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn failure_is_logged_and_swallowed() {
        let out: Option<()> = log_and_continue("provider.close", Err("socket reset"));
        assert!(out.is_none());
        assert!(logs_contain("provider.close"));
        assert!(logs_contain("socket reset"));
    }

    #[test]
    fn success_passes_value_through() {
        assert_eq!(log_and_continue::<_, String>("noop", Ok(7)), Some(7));
    }
}
