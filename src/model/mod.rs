//! Runtime model: param trees, sessions and access flags, entity instantiation, QuadModel.

pub mod access;
pub mod entity;
pub mod param;
pub mod quad;

pub use access::{AccessFlags, Session};
pub use entity::{entity_id, instantiate, ID_FIELD};
pub use param::{Param, ParamShape};
pub use quad::{QuadModel, QuadModelBuilder, CORE_MARKER};
