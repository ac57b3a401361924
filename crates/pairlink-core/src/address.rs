//! Channel-address derivation
//!
//! Maps an identity to the address its peer endpoint listens under. The
//! derivation is pure and total: the same identity yields the same address
//! on every device and every run, so both peers can compute each other's
//! address offline with no discovery service.
//!
//! The address is the identity's email key, base64-encoded with the URL-safe
//! unpadded alphabet (wire-safe characters only) and prefixed with an
//! application namespace so unrelated applications sharing the same broker
//! network cannot collide with us.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

use crate::identity::Identity;
use crate::types::ChannelAddress;

/// Namespace prefix for all PairLink channel addresses
pub const ADDRESS_NAMESPACE: &str = "pairlink-v1-";

/// Derive the channel address for an identity. Pure, total, no failure modes.
pub fn derive_address(identity: &Identity) -> ChannelAddress {
    let encoded = URL_SAFE_NO_PAD.encode(identity.email_key().as_bytes());
    ChannelAddress::new(format!("{ADDRESS_NAMESPACE}{encoded}"))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derivation_is_deterministic() {
        let identity = Identity::new("u1", "Alice", "alice@example.com");
        let first = derive_address(&identity);
        let second = derive_address(&identity);
        assert_eq!(first, second);
    }

    #[test]
    fn test_distinct_identities_get_distinct_addresses() {
        let alice = Identity::new("u1", "Alice", "alice@example.com");
        let bob = Identity::new("u2", "Bob", "bob@example.com");
        assert_ne!(derive_address(&alice), derive_address(&bob));
    }

    #[test]
    fn test_address_is_namespaced_and_wire_safe() {
        let identity = Identity::new("u1", "Alice", "alice+tag@example.com");
        let address = derive_address(&identity);
        assert!(address.as_str().starts_with(ADDRESS_NAMESPACE));
        assert!(address
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
