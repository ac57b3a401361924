//! Identities and the closed two-person roster
//!
//! PairLink is a pairwise system: exactly two identities exist, both known
//! at build time. There is no self-registration; the roster is the entire
//! authentication model, and login is a case-insensitive email match
//! against it.

use serde::{Deserialize, Serialize};

use crate::error::{PairlinkError, Result};
use crate::types::IdentityId;

// ----------------------------------------------------------------------------
// Identity
// ----------------------------------------------------------------------------

/// One of the two known users. Immutable for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    id: IdentityId,
    display_name: String,
    email_key: String,
}

impl Identity {
    pub fn new(
        id: impl Into<IdentityId>,
        display_name: impl Into<String>,
        email_key: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            email_key: email_key.into(),
        }
    }

    pub fn id(&self) -> &IdentityId {
        &self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// The email key addresses are derived from. Not a secret.
    pub fn email_key(&self) -> &str {
        &self.email_key
    }
}

// ----------------------------------------------------------------------------
// Roster
// ----------------------------------------------------------------------------

/// The closed allow-list of exactly two identities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Roster {
    pair: [Identity; 2],
}

impl Roster {
    /// Build the roster, validating that the two identities are actually
    /// distinct and addressable.
    pub fn new(first: Identity, second: Identity) -> Result<Self> {
        if first.email_key.is_empty() || second.email_key.is_empty() {
            return Err(PairlinkError::config_error(
                "roster identities need a non-empty email key",
            ));
        }
        if first.id == second.id {
            return Err(PairlinkError::config_error(
                "roster identities must have distinct ids",
            ));
        }
        if first.email_key.eq_ignore_ascii_case(&second.email_key) {
            return Err(PairlinkError::config_error(
                "roster identities must have distinct email keys",
            ));
        }
        Ok(Self {
            pair: [first, second],
        })
    }

    /// Case-insensitive login match. Returns `None` on a miss; callers must
    /// not mutate any state in that case.
    pub fn authenticate(&self, candidate_email: &str) -> Option<&Identity> {
        self.pair
            .iter()
            .find(|identity| identity.email_key.eq_ignore_ascii_case(candidate_email))
    }

    /// Look up an identity by id
    pub fn get(&self, id: &IdentityId) -> Option<&Identity> {
        self.pair.iter().find(|identity| identity.id() == id)
    }

    /// The other half of the pair
    pub fn counterpart(&self, id: &IdentityId) -> &Identity {
        if self.pair[0].id() == id {
            &self.pair[1]
        } else {
            &self.pair[0]
        }
    }

    pub fn identities(&self) -> &[Identity; 2] {
        &self.pair
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn test_roster() -> Roster {
        Roster::new(
            Identity::new("u1", "Alice", "alice@example.com"),
            Identity::new("u2", "Bob", "bob@example.com"),
        )
        .unwrap()
    }

    #[test]
    fn test_authenticate_is_case_insensitive() {
        let roster = test_roster();
        let hit = roster.authenticate("ALICE@Example.COM").unwrap();
        assert_eq!(hit.id(), &IdentityId::from("u1"));
    }

    #[test]
    fn test_authenticate_rejects_unknown_email() {
        let roster = test_roster();
        assert!(roster.authenticate("mallory@example.com").is_none());
    }

    #[test]
    fn test_counterpart_is_symmetric() {
        let roster = test_roster();
        let a = IdentityId::from("u1");
        let b = IdentityId::from("u2");
        assert_eq!(roster.counterpart(&a).id(), &b);
        assert_eq!(roster.counterpart(&b).id(), &a);
    }

    #[test]
    fn test_roster_rejects_duplicate_identities() {
        let dup = Roster::new(
            Identity::new("u1", "Alice", "alice@example.com"),
            Identity::new("u1", "Alice Again", "alice2@example.com"),
        );
        assert!(dup.is_err());

        let same_email = Roster::new(
            Identity::new("u1", "Alice", "alice@example.com"),
            Identity::new("u2", "Bob", "Alice@Example.com"),
        );
        assert!(same_email.is_err());
    }
}
