use subtle::ConstantTimeEq;

/// Result of the operator password check, decided before any row is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthResult {
    Granted,
    Denied,
}

pub fn authenticate(expected: &str, supplied: Option<&str>) -> AuthResult {
    match supplied {
        Some(supplied) if !expected.is_empty() && bool::from(expected.as_bytes().ct_eq(supplied.as_bytes())) => {
            AuthResult::Granted
        }
        _ => AuthResult::Denied,
    }
}
