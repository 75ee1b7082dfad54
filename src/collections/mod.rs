mod avl;

pub use avl::AvlTree;

#[cfg(feature = "blake2")]
pub use avl::Blake2sAvlTree;
#[cfg(feature = "blake3")]
pub use avl::Blake3AvlTree;
#[cfg(feature = "sha2")]
pub use avl::Sha256AvlTree;
#[cfg(feature = "sha3")]
pub use avl::Sha3AvlTree;
