// Object-set parsing, pooling, and typed front-ends (spec §4.4, §4.5).

pub mod pool;
pub mod set;
pub mod views;

pub use pool::{Object, Pool, Problematic};
pub use set::{AttrDesc, ObjectRecord, ObjectSet, SetKind};
