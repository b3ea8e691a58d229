//! Process exit codes: 0 = PASS-equivalent, 1 = FAIL or verification
//! failure, 2 = hard error (input/policy/io).

use skillvault_core::Verdict;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAIL: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// PASS and WARN are gate-passing; only FAIL exits non-zero.
pub fn from_verdict(verdict: Verdict) -> i32 {
    match verdict {
        Verdict::Pass | Verdict::Warn => EXIT_SUCCESS,
        Verdict::Fail => EXIT_FAIL,
    }
}
