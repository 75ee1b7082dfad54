mod error;
mod hash;

pub mod collections;
pub mod config;
pub mod prelude;
pub mod testing;

#[doc(hidden)]
/// This is a hidden module to make the macros defined on this crate available for the users.
pub mod __dependencies {
    pub use paste;
    pub use proptest;
    pub use test_strategy;
}

/// Generates model-based property tests for a [`Store`](crate::prelude::Store)
/// implementation, checking it against a `BTreeMap` under random operation sequences.
#[macro_export]
macro_rules! test_store_properties {
    ($type:ty) => {
        $crate::__dependencies::paste::paste! {
            mod [<test_store_$type:snake>] {
                use std::collections::BTreeMap;

                use $crate::__dependencies::{
                    proptest::prelude::*,
                    test_strategy,
                };
                use $crate::prelude::*;
                use $crate::testing::{operations, Operation};

                use super::$type;

                #[cfg_attr(coverage_nightly, coverage(off))]
                #[test_strategy::proptest(fork = false)]
                fn test_matches_model(#[strategy(operations(0..64))] ops: Vec<Operation>) {
                    let mut store = <$type>::default();
                    let mut model = BTreeMap::new();

                    for op in ops {
                        prop_assert_eq!(op.apply(&mut store), op.apply_to_model(&mut model));
                    }

                    for (key, value) in &model {
                        prop_assert_eq!(store.get(key)?, value.as_slice());
                    }
                }

                #[cfg_attr(coverage_nightly, coverage(off))]
                #[test_strategy::proptest(fork = false)]
                fn test_set_is_add_or_update(
                    #[strategy(operations(0..32))] ops: Vec<Operation>,
                    key: Vec<u8>,
                    value: Vec<u8>
                ) {
                    let mut store = <$type>::default();
                    for op in ops {
                        let _ = op.apply(&mut store);
                    }

                    let mut expected = store.clone();
                    if let Err(Error::DuplicateKey) = expected.add(&key, &value) {
                        expected.update(&key, &value)?;
                    }

                    store.set(&key, &value)?;
                    prop_assert_eq!(store.get(&key)?, value.as_slice());
                    prop_assert_eq!(store.root_hash()?, expected.root_hash()?);
                }

                #[cfg_attr(coverage_nightly, coverage(off))]
                #[test_strategy::proptest(fork = false)]
                fn test_removed_keys_are_gone(
                    #[strategy(operations(0..32))] ops: Vec<Operation>,
                    key: Vec<u8>,
                    value: Vec<u8>
                ) {
                    let mut store = <$type>::default();
                    for op in ops {
                        let _ = op.apply(&mut store);
                    }

                    store.set(&key, &value)?;
                    store.remove(&key)?;

                    prop_assert!(store.get(&key).is_err());
                    prop_assert!(store.remove(&key).is_err());
                }
            }
        }
    };
}

#[macro_export]
macro_rules! test_to_hex {
    ($type:ty) => {
        $crate::__dependencies::paste::paste! {
            mod [<test_to_hex_$type:snake>] {
                use $crate::__dependencies::{
                    proptest::prelude::*,
                    test_strategy,
                };

                use $crate::prelude::*;
                use super::$type;

                #[test_strategy::proptest(fork = false)]
                fn test_roundtrip(a: $type) {
                    prop_assert_eq!(a.clone(), <$type>::from_hex(&a.to_hex())?);
                }

                #[test_strategy::proptest(fork = false)]
                fn test_output_consistency(a: $type) {
                    prop_assert_eq!(a.to_hex(), <$type>::from_hex(&a.to_hex())?.to_hex());
                }

                #[test_strategy::proptest(fork = false)]
                fn test_is_different_on_different_objects(a: $type, b: $type) {
                    prop_assert_eq!(a == b, a.to_hex() == b.to_hex());
                }
            }
        }
    };
}

#[macro_export]
macro_rules! prop_assert_changes {
    ($action: expr, $value: expr) => {
        let old_value = $value.clone();

        prop_assert_eq!($value, old_value.clone());

        $action;

        prop_assert_ne!($value, old_value);
    };
}

#[macro_export]
macro_rules! prop_assert_does_not_change {
    ($action: expr, $value: expr) => {
        let old_value = $value.clone();

        $action;

        prop_assert_eq!($value, old_value);
    };
}
