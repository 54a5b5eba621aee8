//! Read-through entity cache.
//!
//! This module keeps a client-side copy of server entities:
//! - Singleton entities are cached by type and id
//! - List elements are cached as one gap-free range per list, so a range
//!   read only asks the server for what is not known yet
//! - Server change notifications keep cached entities current
//!
//! Nothing is persisted; the cache lives as long as its [`RangeCache`].

mod events;
mod layer;
mod policy;
mod range;
mod record;
mod storage;
#[cfg(test)]
mod testing;
mod traits;

pub use events::{EntityUpdate, OperationType};
pub use layer::RangeCache;
pub use policy::{CachePolicy, IdTypeRegistry};
pub use record::RangeRecord;
pub use storage::CacheStorage;
pub use traits::{Entity, TypeResolver};
