//! Hash-based collections.

use crate::hash::FastBuildHasher;

/// A hash map based on `hashbrown` ([`HashMap`][hashbrown::HashMap]) using [`FastHasher`][crate::hash::FastHasher].
pub type FastHashMap<K, V> = hashbrown::HashMap<K, V, FastBuildHasher>;

/// A hash map with stable insertion order based on `indexmap` ([`IndexMap`][indexmap::IndexMap]) using
/// [`FastHasher`][crate::hash::FastHasher].
pub type FastIndexMap<K, V> = indexmap::IndexMap<K, V, FastBuildHasher>;
