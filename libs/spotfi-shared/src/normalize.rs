//! Normalization helpers used by router identity resolution (spec.md §4.3)
//! and by the broker presence pipeline. Pure functions so the idempotency
//! law in spec.md §8 ("normalize(raw) == normalize(normalize(raw))") can be
//! tested without a database.

/// Uppercase, separator-stripped MAC address, used both for storage
/// (`Router.macAddress`) and for matching the portal's `called` parameter.
pub fn normalize_mac(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_hexdigit())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Lowercase, non-alphanumeric-stripped router name, used for the
/// fallback name-based resolution step.
pub fn normalize_name(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_normalization_is_idempotent() {
        let raw = "80:af:CA-c6.70:55";
        let once = normalize_mac(raw);
        let twice = normalize_mac(&once);
        assert_eq!(once, twice);
        assert_eq!(once, "80AFCAC67055");
    }

    #[test]
    fn name_normalization_is_idempotent() {
        let raw = "  Main Hotspot #1  ";
        let once = normalize_name(raw);
        let twice = normalize_name(&once);
        assert_eq!(once, twice);
        assert_eq!(once, "mainhotspot1");
    }
}
