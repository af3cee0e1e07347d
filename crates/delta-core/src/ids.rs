//! Run ID generation.
//!
//! Auto-generated run ids follow `YYYYMMDD_HHMMSS_<6hex>`.
//! Client-supplied ids are accepted as-is and enforced unique by the
//! workspace layer.

use chrono::Utc;
use rand::RngCore;

/// Generate a new run id of the form `YYYYMMDD_HHMMSS_<6hex>`.
pub fn generate_run_id() -> String {
    let now = Utc::now();
    let mut suffix_bytes = [0u8; 3];
    rand::thread_rng().fill_bytes(&mut suffix_bytes);
    format!(
        "{}_{}",
        now.format("%Y%m%d_%H%M%S"),
        hex::encode(suffix_bytes)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_id_matches_expected_shape() {
        let id = generate_run_id();
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3, "expected DATE_TIME_HEX, got {id}");
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1].len(), 6);
        assert_eq!(parts[2].len(), 6);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_ids_are_not_trivially_colliding() {
        let a = generate_run_id();
        let b = generate_run_id();
        // Same second is plausible; the hex suffix is what keeps them apart.
        assert_ne!(a, b);
    }
}
