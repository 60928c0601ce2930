//! Forwarding table and recipient resolution.
//!
//! Addresses are normalized (lower-cased, plus tag removed) and then looked
//! up with increasingly general keys: the full address, the `@domain`, the
//! local part, and finally the catch-all key `"@"`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Key of the catch-all entry.
pub const CATCH_ALL_KEY: &str = "@";

/// Mapping from address keys to destination addresses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ForwardingTable {
    entries: HashMap<String, Vec<String>>,
}

/// Which lookup rule produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    /// The full normalized address.
    Exact,
    /// The `@domain` part.
    Domain,
    /// The local part.
    LocalPart,
    /// The `"@"` entry.
    CatchAll,
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Exact => "exact",
            Self::Domain => "domain",
            Self::LocalPart => "local_part",
            Self::CatchAll => "catch_all",
        };
        f.write_str(name)
    }
}

/// Outcome of resolving every original recipient.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Accumulated destinations, in recipient order then table order.
    pub destinations: Vec<String>,
    /// The last original recipient that hit a table entry.
    pub envelope_sender: Option<String>,
    /// Original recipients that matched nothing.
    pub unmatched: Vec<String>,
}

impl ForwardingTable {
    /// Parses a table from its JSON representation.
    pub fn from_json(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }

    /// Returns true if the table has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Adds or replaces an entry.
    #[must_use]
    pub fn with_entry(
        mut self,
        key: impl Into<String>,
        destinations: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.entries
            .insert(key.into(), destinations.into_iter().map(Into::into).collect());
        self
    }

    /// Looks up a normalized key, trying each rule in order.
    ///
    /// A present key is a match even when it maps to an empty list.
    #[must_use]
    pub fn lookup(&self, normalized: &str) -> Option<(MatchRule, &[String])> {
        if let Some(found) = self.entries.get(normalized) {
            return Some((MatchRule::Exact, found));
        }

        let local = match normalized.rfind('@') {
            Some(pos) => {
                if let Some(found) = self.entries.get(&normalized[pos..]) {
                    return Some((MatchRule::Domain, found));
                }
                &normalized[..pos]
            }
            None => normalized,
        };

        if let Some(found) = self.entries.get(local) {
            return Some((MatchRule::LocalPart, found));
        }

        self.entries
            .get(CATCH_ALL_KEY)
            .map(|found| (MatchRule::CatchAll, found.as_slice()))
    }

    /// Resolves every original recipient against the table.
    #[must_use]
    pub fn resolve(&self, recipients: &[String], strip_plus: bool) -> Resolution {
        let mut resolution = Resolution::default();

        for original in recipients {
            let key = normalize_address(original, strip_plus);
            match self.lookup(&key) {
                Some((rule, destinations)) => {
                    tracing::debug!(
                        recipient = %original,
                        key = %key,
                        rule = %rule,
                        destinations = destinations.len(),
                        "Forwarding rule matched"
                    );
                    resolution.destinations.extend(destinations.iter().cloned());
                    resolution.envelope_sender = Some(original.clone());
                }
                None => resolution.unmatched.push(original.clone()),
            }
        }

        resolution
    }
}

/// Normalizes an address into a lookup key.
///
/// The address is lower-cased and, when `strip_plus` is set, the text from
/// the first `+` up to the next `@` is removed.
#[must_use]
pub fn normalize_address(address: &str, strip_plus: bool) -> String {
    let lowered = address.to_lowercase();
    if !strip_plus {
        return lowered;
    }

    if let Some(plus) = lowered.find('+') {
        if let Some(offset) = lowered[plus..].find('@') {
            let mut stripped = String::with_capacity(lowered.len());
            stripped.push_str(&lowered[..plus]);
            stripped.push_str(&lowered[plus + offset..]);
            return stripped;
        }
    }

    lowered
}
