//! Fast hash collections, following the teacher's choice of `rustc-hash`
//! for the in-memory aggregation maps bucketed analyzers build (§4.5.7,
//! §5 "in-memory aggregation maps ... must stay bounded").

use rustc_hash::{FxHashMap as RustcFxHashMap, FxHashSet as RustcFxHashSet};

pub type FxHashMap<K, V> = RustcFxHashMap<K, V>;
pub type FxHashSet<T> = RustcFxHashSet<T>;
