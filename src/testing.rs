use std::collections::BTreeMap;

use proptest::{
    collection::{btree_map, vec},
    prelude::*,
    sample::SizeRange,
};

use crate::prelude::*;

pub type Entry = (Vec<u8>, Vec<u8>);

/// Entries with distinct keys, in random order.
pub fn entries(size: impl Into<SizeRange>) -> impl Strategy<Value = Vec<Entry>> {
    btree_map(vec(any::<u8>(), 0..16), vec(any::<u8>(), 0..16), size)
        .prop_map(|entries| entries.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

/// A single call against a [`Store`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Add(Vec<u8>, Vec<u8>),
    Set(Vec<u8>, Vec<u8>),
    Update(Vec<u8>, Vec<u8>),
    Remove(Vec<u8>),
}

impl Arbitrary for Operation {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        // A small key alphabet, so operations keep hitting existing keys.
        let key = || vec(0u8..6, 0..3);
        let value = || vec(any::<u8>(), 0..8);

        prop_oneof![
            3 => (key(), value()).prop_map(|(k, v)| Operation::Add(k, v)),
            2 => (key(), value()).prop_map(|(k, v)| Operation::Set(k, v)),
            2 => (key(), value()).prop_map(|(k, v)| Operation::Update(k, v)),
            3 => key().prop_map(Operation::Remove),
        ]
        .boxed()
    }
}

impl Operation {
    pub fn apply<S: Store>(&self, store: &mut S) -> Result<()> {
        match self {
            Operation::Add(key, value) => store.add(key, value),
            Operation::Set(key, value) => store.set(key, value),
            Operation::Update(key, value) => store.update(key, value),
            Operation::Remove(key) => store.remove(key),
        }
    }

    /// Applies the operation to a plain map, returning the result a [`Store`] must report.
    pub fn apply_to_model(&self, model: &mut BTreeMap<Vec<u8>, Vec<u8>>) -> Result<()> {
        let missing = if model.is_empty() {
            Error::EmptyTree
        } else {
            Error::KeyNotFound
        };

        match self {
            Operation::Add(key, _) if model.contains_key(key) => Err(Error::DuplicateKey),
            Operation::Add(key, value) | Operation::Set(key, value) => {
                model.insert(key.clone(), value.clone());
                Ok(())
            }
            Operation::Update(key, value) => match model.get_mut(key) {
                Some(slot) => {
                    *slot = value.clone();
                    Ok(())
                }
                None => Err(missing),
            },
            Operation::Remove(key) => model.remove(key).map(|_| ()).ok_or(missing),
        }
    }
}

pub fn operations(size: impl Into<SizeRange>) -> impl Strategy<Value = Vec<Operation>> {
    vec(any::<Operation>(), size)
}

#[cfg(test)]
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
