//! CSRF token checks.
//!
//! Every state-changing form carries the session's CSRF token. A forged
//! request from another site can make the browser send the session cookie,
//! but it cannot read the token, so it cannot echo it back.
//!
//! Comparison goes through [`subtle::ConstantTimeEq`]: an ordinary `==`
//! returns as soon as one byte differs, which would let an attacker
//! recover the token one byte at a time by timing responses.

use subtle::ConstantTimeEq;

/// Returns `true` only when `candidate` is present, non-empty, and equal
/// to the `stored` token.
///
/// No stored token means nothing can match: a session that never rendered
/// a form has never handed out a token.
pub fn tokens_match(stored: Option<&str>, candidate: Option<&str>) -> bool {
    let (Some(stored), Some(candidate)) = (stored, candidate) else {
        return false;
    };
    if stored.is_empty() || candidate.is_empty() {
        return false;
    }
    // Slices of different lengths compare unequal without inspecting bytes;
    // the length of the token is not a secret.
    stored.as_bytes().ct_eq(candidate.as_bytes()).into()
}
