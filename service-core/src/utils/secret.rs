use subtle::ConstantTimeEq;

/// Compare a caller-supplied secret against the expected one in constant time.
///
/// An empty expected secret never matches, so an unset access code locks the
/// gate instead of opening it.
pub fn secrets_match(expected: &str, provided: &str) -> bool {
    let expected_bytes = expected.as_bytes();
    let provided_bytes = provided.as_bytes();

    if expected_bytes.is_empty() || expected_bytes.len() != provided_bytes.len() {
        return false;
    }

    expected_bytes.ct_eq(provided_bytes).into()
}
