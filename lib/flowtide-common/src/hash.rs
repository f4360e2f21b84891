//! Hashing primitives.

/// A fast, non-cryptographic hasher with good distribution.
///
/// Keys in flowtide tables are small integers and short strings coming off the wire, so this favors speed over DoS
/// resistance of the hash function itself. [`foldhash`][foldhash] is the underlying implementation.
///
/// [foldhash]: http://github.com/orlp/foldhash
pub type FastHasher = foldhash::quality::FoldHasher;

/// [`BuildHasher`][std::hash::BuildHasher] implementation for [`FastHasher`].
///
/// Each instance is randomly seeded.
pub type FastBuildHasher = foldhash::quality::RandomState;

/// Returns a freshly seeded [`FastBuildHasher`].
#[inline]
pub fn get_fast_build_hasher() -> FastBuildHasher {
    foldhash::quality::RandomState::default()
}
