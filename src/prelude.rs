pub use crate::{collections::*, config::*, error::*, hash::*};

/// The key-value contract of an authenticated store.
///
/// Keys and values are opaque byte strings; keys are ordered by their bytes.
pub trait Store {
    /// Returns the value stored under `key`.
    fn get(&self, key: &[u8]) -> Result<&[u8]>;

    /// Inserts a new key, failing with [`Error::DuplicateKey`] if it is already present.
    fn add(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Replaces the value of an existing key.
    fn update(&mut self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Removes a key and its value.
    fn remove(&mut self, key: &[u8]) -> Result<()>;

    /// The digest committing to the whole content of the store.
    fn root_hash(&self) -> Result<Hash>;

    /// Inserts or replaces the value of `key`.
    ///
    /// This is derived from [`Store::add`] and [`Store::update`].
    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        match self.add(key, value) {
            Err(Error::DuplicateKey) => self.update(key, value),
            result => result,
        }
    }
}

pub trait FromHex
where
    Self: Sized,
{
    fn from_hex(hex: &str) -> Result<Self>;
}

pub trait ToHex {
    fn to_hex(&self) -> String;
}
