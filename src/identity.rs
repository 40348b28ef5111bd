//! Identity service
//!
//! Allocates short guids for nodes and users, refusing blacklisted strings and
//! anything already handed out, and mints the unguessable tokens used by
//! sanction ledgers and private links.

use osf_types::{Guid, GUID_ALPHABET};
use rand::distributions::Alphanumeric;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Length of sanction and private-link tokens.
const TOKEN_LENGTH: usize = 30;

/// Allocated and blacklisted guids.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuidRegistry {
    allocated: BTreeSet<Guid>,
    blacklist: BTreeSet<Guid>,
}

impl GuidRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw candidates until one is neither blacklisted nor already allocated.
    pub fn allocate(&mut self, length: usize) -> Guid {
        let alphabet: Vec<char> = GUID_ALPHABET.chars().collect();
        let length = length.clamp(1, alphabet.len());
        let mut rng = rand::thread_rng();
        loop {
            let candidate: String = alphabet.choose_multiple(&mut rng, length).collect();
            let guid = Guid::new_unchecked(candidate);
            if self.is_available(&guid) {
                self.allocated.insert(guid.clone());
                return guid;
            }
        }
    }

    /// Reserve a specific guid. Returns false when it is taken or blacklisted.
    pub fn claim(&mut self, guid: &Guid) -> bool {
        if !self.is_available(guid) {
            return false;
        }
        self.allocated.insert(guid.clone())
    }

    pub fn blacklist(&mut self, guid: Guid) {
        self.blacklist.insert(guid);
    }

    pub fn is_blacklisted(&self, guid: &Guid) -> bool {
        self.blacklist.contains(guid)
    }

    pub fn is_available(&self, guid: &Guid) -> bool {
        !self.blacklist.contains(guid) && !self.allocated.contains(guid)
    }

    pub fn allocated_count(&self) -> usize {
        self.allocated.len()
    }
}

/// Random alphanumeric token for approval links.
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_uses_alphabet_without_repeats() {
        let mut registry = GuidRegistry::new();
        let guid = registry.allocate(5);
        assert_eq!(guid.as_str().len(), 5);
        assert!(guid.as_str().chars().all(|c| GUID_ALPHABET.contains(c)));
        let distinct: BTreeSet<char> = guid.as_str().chars().collect();
        assert_eq!(distinct.len(), 5);
        assert!(!registry.is_available(&guid));
    }

    #[test]
    fn test_allocate_skips_blacklisted_and_taken() {
        let mut registry = GuidRegistry::new();
        // With length 1 there are only as many guids as alphabet characters.
        let alphabet: Vec<char> = GUID_ALPHABET.chars().collect();
        for ch in &alphabet[..alphabet.len() - 2] {
            registry.blacklist(Guid::new_unchecked(ch.to_string()));
        }
        let last_but_one = Guid::new_unchecked(alphabet[alphabet.len() - 2].to_string());
        assert!(registry.claim(&last_but_one));

        let guid = registry.allocate(1);
        assert_eq!(guid.as_str(), alphabet[alphabet.len() - 1].to_string());
    }

    #[test]
    fn test_claim_refuses_blacklisted() {
        let mut registry = GuidRegistry::new();
        let guid = Guid::new_unchecked("abcde");
        registry.blacklist(guid.clone());
        assert!(registry.is_blacklisted(&guid));
        assert!(!registry.claim(&guid));
    }

    #[test]
    fn test_tokens_are_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_LENGTH);
        assert_ne!(a, b);
    }
}
