//! Finite-element side of the coupling: mesh, solution fields, point
//! location and inter-rank communication.
pub mod comm;
pub mod field;
pub mod generate;
pub mod locator;
pub mod mesh;

pub use comm::{Communicator, LocalComm, SerialComm};
pub use field::FieldSystem;
pub use locator::{FieldSampler, PointLocator};
pub use mesh::{BlockId, ElemId, Element, ElementKind, FeMesh, NodeId};
