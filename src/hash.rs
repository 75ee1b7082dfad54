use std::fmt::{Display, Formatter};

use digest::{consts::U32, Digest};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;

use crate::{
    error::Result,
    prelude::{FromHex, ToHex},
};

/// A [`Digest`] whose output fits a [`Hash`].
///
/// Every tree is parameterized by one of these, so a hash function with a wider output is
/// rejected when the tree type is named:
///
/// ```compile_fail
/// use merkle_avl::prelude::*;
///
/// let tree = AvlTree::<sha3::Sha3_512>::new();
/// ```
pub trait HashFunction: Digest<OutputSize = U32> {}

impl<D: Digest<OutputSize = U32>> HashFunction for D {}

/// A 32-byte digest, as produced by every hash function the crate can be built with.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Hash([u8; 32]);

impl Display for Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl std::fmt::Debug for Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Arbitrary for Hash {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        any::<[u8; 32]>().prop_map(Hash::from).boxed()
    }
}

impl Hash {
    /// Returns a zero hash (all bytes set to 0).
    pub fn zero() -> Self {
        Self([0u8; 32])
    }

    /// Creates a new Hash from a hexadecimal string.
    pub fn from_hex(hex: &str) -> Result<Self> {
        let bytes = hex::decode(hex)?;

        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength)?;
        }

        Self::try_from(bytes.as_slice())
    }

    /// Consumes a hasher and returns its output.
    pub fn finish<D: HashFunction>(hasher: D) -> Self {
        Hash(hasher.finalize().into())
    }

    pub fn digest<D: HashFunction>(data: &[u8]) -> Self {
        let mut hasher = D::new();
        hasher.update(data);
        Hash::finish(hasher)
    }

    pub fn combine<D: HashFunction>(left: &Hash, right: &Hash) -> Self {
        let mut hasher = D::new();
        hasher.update(left.as_ref());
        hasher.update(right.as_ref());
        Hash::finish(hasher)
    }
}

impl Default for Hash {
    fn default() -> Self {
        Hash::zero()
    }
}

impl From<[u8; 32]> for Hash {
    fn from(array: [u8; 32]) -> Self {
        Hash(array)
    }
}

impl TryFrom<&[u8]> for Hash {
    type Error = crate::error::Error;

    fn try_from(slice: &[u8]) -> Result<Self> {
        Ok(Hash(<[u8; 32]>::try_from(slice)?))
    }
}

impl AsRef<[u8]> for Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl ToHex for Hash {
    fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromHex for Hash {
    fn from_hex(input: &str) -> Result<Self> {
        Hash::from_hex(input)
    }
}
