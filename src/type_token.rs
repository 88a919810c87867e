//! Type tags and type-erased batch helpers.
//!
//! Units are stored in a heterogeneous arena, so the batches that travel along
//! edges are type-erased:
//! - [`Partition`]: a boxed `Vec<T>` produced by one unit and lent to each of
//!   its destinations in turn.
//! - [`TypeTag`]: a lightweight runtime type identifier for the rows a unit
//!   emits, as reported by [`Pipeline::row_type`](crate::pipeline::Pipeline::row_type).
//!
//! Units recover the concrete batch with [`downcast_batch`], which reports a
//! [`RunError::TypeMismatch`] instead of panicking.

use crate::error::RunError;
use std::any::{Any, TypeId, type_name};

/// A batch of rows carried between units at runtime.
///
/// Always a `Vec<T>` for the row type `T` of the emitting unit.
pub type Partition = Box<dyn Any + Send + Sync>;

/// A lightweight runtime type tag for debugging and assertions.
///
/// ```
/// use rankflow::type_token::TypeTag;
/// let tag = TypeTag::of::<u32>();
/// assert_eq!(tag.name, "u32");
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TypeTag {
    /// Stable Rust type identifier.
    pub id: TypeId,
    /// Human-readable type name (best-effort).
    pub name: &'static str,
}

impl TypeTag {
    /// Construct a tag for `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
        }
    }
}

/// Box a batch of rows for emission.
#[inline]
pub fn into_partition<T: Send + Sync + 'static>(rows: Vec<T>) -> Partition {
    Box::new(rows)
}

/// Borrow a type-erased batch as `&[T]`.
///
/// # Errors
/// Returns [`RunError::TypeMismatch`] naming `unit` if the batch is not a `Vec<T>`.
pub fn downcast_batch<'a, T: 'static>(batch: &'a dyn Any, unit: &str) -> Result<&'a [T], RunError> {
    batch
        .downcast_ref::<Vec<T>>()
        .map(Vec::as_slice)
        .ok_or_else(|| RunError::TypeMismatch {
            unit: unit.to_string(),
            expected: type_name::<T>(),
        })
}
