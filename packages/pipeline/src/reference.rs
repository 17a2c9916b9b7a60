//! Tracking-code generation.
//!
//! Reference codes are the human-shareable identifiers on incident
//! records (`PH-<year>-<6 alphanumeric>`), independent of the internal
//! id. Collisions are astronomically unlikely, but the generator still
//! re-rolls and re-checks against the store until the code is free.

use chrono::{Datelike, Utc};
use pothole_map_database::{DbError, RegistryStore};
use rand::Rng as _;

const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Generates a random uppercase-alphanumeric suffix of `len` characters.
#[must_use]
pub fn random_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| char::from(CHARSET[rng.gen_range(0..CHARSET.len())]))
        .collect()
}

/// Generates a collision-free reference code (`PH-<year>-<6 chars>`).
///
/// # Errors
///
/// Returns [`DbError`] if the uniqueness lookup fails.
pub async fn generate_reference(store: &dyn RegistryStore) -> Result<String, DbError> {
    let year = Utc::now().year();

    loop {
        let reference = format!("PH-{year}-{}", random_suffix(6));
        if store.incident_by_reference(&reference).await?.is_none() {
            return Ok(reference);
        }
        log::debug!("Reference {reference} already taken, re-rolling");
    }
}

/// Generates an invitation code (`GOV-<8 chars>`).
#[must_use]
pub fn generate_invitation_code() -> String {
    format!("GOV-{}", random_suffix(8))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suffix_alphabet_and_length() {
        for _ in 0..100 {
            let suffix = random_suffix(6);
            assert_eq!(suffix.len(), 6);
            assert!(suffix.bytes().all(|b| CHARSET.contains(&b)));
        }
    }

    #[test]
    fn invitation_code_shape() {
        let code = generate_invitation_code();
        assert!(code.starts_with("GOV-"));
        assert_eq!(code.len(), 12);
    }
}
