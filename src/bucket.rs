//! Bucket keys: what identifies a serialization domain.

use std::hash::Hash;

/// A bucket key. Jobs sharing a key run strictly in submission order;
/// distinct keys drain independently.
///
/// The only functional requirements are equality, hashing, and being
/// sendable to the drain task. [`label`](BucketKey::label) is a
/// best-effort printable form used to name the bucket's executor span
/// for diagnostics; it never influences scheduling. Key types without a
/// sensible printable form keep the default `None`; submission under
/// such a key logs a warning and proceeds unlabeled.
pub trait BucketKey: Eq + Hash + Clone + Send + 'static {
    /// Printable form of the key, if it has one.
    fn label(&self) -> Option<String> {
        None
    }
}

impl BucketKey for String {
    fn label(&self) -> Option<String> {
        Some(self.clone())
    }
}

impl BucketKey for &'static str {
    fn label(&self) -> Option<String> {
        Some((*self).to_string())
    }
}

/// Session and device identifiers are commonly UUIDs.
impl BucketKey for uuid::Uuid {
    fn label(&self) -> Option<String> {
        Some(self.to_string())
    }
}

macro_rules! impl_bucket_key_for_integers {
    ($($ty:ty),* $(,)?) => {
        $(impl BucketKey for $ty {
            fn label(&self) -> Option<String> {
                Some(self.to_string())
            }
        })*
    };
}

impl_bucket_key_for_integers!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);
