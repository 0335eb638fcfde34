//! Session consistency tracking.
//!
//! Under session consistency every response carries a session token, and
//! reads must present the latest token the client has seen for the target
//! container to be guaranteed to observe the client's own writes.
//!
//! Tokens come in the service's vector format, one segment per partition
//! key range joined by `,`:
//!
//! ```text
//! {rangeId}:{version}#{globalLsn}#{regionId}={localLsn}...
//! ```
//!
//! or the older `{rangeId}:{lsn}` form. [`SessionTracker`] merges segments
//! per range and keeps the higher one, so a late response carrying an older
//! token never rolls a container's token back. Tokens that do not parse are
//! kept as opaque strings and replaced by whatever is observed next.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use parking_lot::RwLock;
use tracing::debug;

use crate::resource::ResourceLink;

/// One partition key range's part of a session token.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    range_id: String,
    version: i64,
    global_lsn: i64,
    regions: BTreeMap<u32, i64>,
    legacy: bool,
}

impl Segment {
    fn parse(text: &str) -> Option<Self> {
        let (range_id, rest) = text.trim().split_once(':')?;
        if range_id.is_empty() {
            return None;
        }
        let mut parts = rest.split('#');
        let first = parts.next()?.parse::<i64>().ok()?;
        let Some(second) = parts.next() else {
            return Some(Self {
                range_id: range_id.to_string(),
                version: 0,
                global_lsn: first,
                regions: BTreeMap::new(),
                legacy: true,
            });
        };
        let global_lsn = second.parse::<i64>().ok()?;
        let regions = parts
            .map(|part| {
                let (region, lsn) = part.split_once('=')?;
                Some((region.parse::<u32>().ok()?, lsn.parse::<i64>().ok()?))
            })
            .collect::<Option<BTreeMap<_, _>>>()?;
        Some(Self {
            range_id: range_id.to_string(),
            version: first,
            global_lsn,
            regions,
            legacy: false,
        })
    }

    /// Merges `other` into `self`, keeping the newer progress.
    fn merge(&mut self, other: &Self) {
        if self.legacy != other.legacy {
            *self = other.clone();
            return;
        }
        match other.version.cmp(&self.version) {
            std::cmp::Ordering::Greater => *self = other.clone(),
            std::cmp::Ordering::Less => {}
            std::cmp::Ordering::Equal => {
                self.global_lsn = self.global_lsn.max(other.global_lsn);
                for (region, lsn) in &other.regions {
                    let entry = self.regions.entry(*region).or_insert(*lsn);
                    *entry = (*entry).max(*lsn);
                }
            }
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.legacy {
            return write!(f, "{}:{}", self.range_id, self.global_lsn);
        }
        write!(f, "{}:{}#{}", self.range_id, self.version, self.global_lsn)?;
        for (region, lsn) in &self.regions {
            write!(f, "#{region}={lsn}")?;
        }
        Ok(())
    }
}

/// A parsed session token.
///
/// # Example
///
/// ```rust
/// use cosmosdb::session::SessionToken;
///
/// let current = SessionToken::parse("0:1#12#3=12,1:1#7#3=7").unwrap();
/// let late = SessionToken::parse("0:1#9#3=9").unwrap();
/// let newer = SessionToken::parse("1:1#20#3=20").unwrap();
///
/// let merged = current.merge(&late).merge(&newer);
/// assert_eq!(merged.to_string(), "0:1#12#3=12,1:1#20#3=20");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken {
    repr: Repr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Repr {
    /// Per-range segments in first-seen order.
    Vector(Vec<Segment>),
    /// A token in an unrecognized format.
    Opaque(String),
}

impl SessionToken {
    /// Parses a token. Returns `None` for an empty or blank string.
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let segments = text
            .split(',')
            .map(Segment::parse)
            .collect::<Option<Vec<_>>>();
        let repr = segments.map_or_else(|| Repr::Opaque(text.to_string()), Repr::Vector);
        Some(Self { repr })
    }

    /// Returns `true` if the token was not in a recognized format.
    #[must_use]
    pub const fn is_opaque(&self) -> bool {
        matches!(self.repr, Repr::Opaque(_))
    }

    /// Returns the result of merging a newly observed token into this one.
    ///
    /// Vector tokens merge per range; otherwise `observed` wins.
    #[must_use]
    pub fn merge(&self, observed: &Self) -> Self {
        match (&self.repr, &observed.repr) {
            (Repr::Vector(current), Repr::Vector(incoming)) => {
                let mut merged = current.clone();
                for segment in incoming {
                    match merged.iter_mut().find(|s| s.range_id == segment.range_id) {
                        Some(existing) => existing.merge(segment),
                        None => merged.push(segment.clone()),
                    }
                }
                Self {
                    repr: Repr::Vector(merged),
                }
            }
            _ => observed.clone(),
        }
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.repr {
            Repr::Opaque(text) => f.write_str(text),
            Repr::Vector(segments) => {
                for (i, segment) in segments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{segment}")?;
                }
                Ok(())
            }
        }
    }
}

/// Last-seen session token per container.
///
/// One tracker is shared by every handle created from a client. Observes
/// merge under a write lock so concurrent responses never lose an update.
///
/// # Example
///
/// ```rust
/// use cosmosdb::resource::{ResourceLink, ResourceType};
/// use cosmosdb::session::SessionTracker;
///
/// let tracker = SessionTracker::new();
/// let container = ResourceLink::root()
///     .child(ResourceType::Database, "db").unwrap()
///     .child(ResourceType::Container, "orders").unwrap();
///
/// tracker.observe(&container, "0:1#15");
/// tracker.observe(&container, "0:1#11"); // late response, ignored
/// assert_eq!(tracker.current_token(&container).as_deref(), Some("0:1#15"));
/// ```
#[derive(Debug, Default)]
pub struct SessionTracker {
    tokens: RwLock<HashMap<ResourceLink, SessionToken>>,
}

impl SessionTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a token returned for `container`.
    ///
    /// Empty tokens are ignored. Returns `true` if the stored token changed.
    pub fn observe(&self, container: &ResourceLink, token: &str) -> bool {
        let Some(observed) = SessionToken::parse(token) else {
            return false;
        };
        let mut tokens = self.tokens.write();
        let merged = tokens
            .get(container)
            .map_or_else(|| observed.clone(), |current| current.merge(&observed));
        if tokens.get(container) == Some(&merged) {
            return false;
        }
        debug!(container = %container, token = %merged, "Session token advanced");
        tokens.insert(container.clone(), merged);
        true
    }

    /// Returns the token to present on the next request to `container`.
    #[must_use]
    pub fn current_token(&self, container: &ResourceLink) -> Option<String> {
        self.tokens.read().get(container).map(ToString::to_string)
    }

    /// Forgets the token of `container`, e.g. after it was deleted.
    pub fn clear(&self, container: &ResourceLink) {
        self.tokens.write().remove(container);
    }

    /// Returns the number of containers with a token.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.read().len()
    }

    /// Returns `true` if no token has been observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.read().is_empty()
    }
}

// Verify types are Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<SessionToken>();
    assert_send_sync::<SessionTracker>();
};
