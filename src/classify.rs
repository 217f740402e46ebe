//! Error classification: deciding which failures a policy intervenes on.
//!
//! A policy only retries or trips its breaker for errors its classifier
//! recognizes; everything else propagates untouched on first occurrence.

/// Decides whether an error is one of the kinds a policy handles.
///
/// Any `Fn(&E) -> bool` closure is a classifier. For errors that expose a
/// discriminant tag, [`KindSet`] gives a closed set-membership check.
pub trait Classify<E>: Send + Sync {
    /// True when the policy should intervene on this error.
    fn handles(&self, error: &E) -> bool;
}

impl<E, F> Classify<E> for F
where
    F: Fn(&E) -> bool + Send + Sync,
{
    fn handles(&self, error: &E) -> bool {
        self(error)
    }
}

/// Errors that expose a discriminant tag usable for classification.
pub trait Kinded {
    /// The tag type distinguishing error kinds.
    type Kind: PartialEq;

    /// The tag for this particular error value.
    fn kind(&self) -> Self::Kind;
}

impl Kinded for std::io::Error {
    type Kind = std::io::ErrorKind;

    fn kind(&self) -> std::io::ErrorKind {
        std::io::Error::kind(self)
    }
}

/// A closed set of handled error kinds.
pub struct KindSet<K> {
    kinds: Vec<K>,
}

impl<K: PartialEq> KindSet<K> {
    /// Builds the set from any collection of kind tags.
    pub fn new(kinds: impl IntoIterator<Item = K>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }

    /// Membership test against the registered kinds.
    pub fn contains(&self, kind: &K) -> bool {
        self.kinds.contains(kind)
    }
}

impl<E> Classify<E> for KindSet<E::Kind>
where
    E: Kinded,
    E::Kind: Send + Sync,
{
    fn handles(&self, error: &E) -> bool {
        self.contains(&error.kind())
    }
}
