pub mod boundary;
pub mod bridge;
pub mod config;
pub mod db;
pub mod derive;
pub mod deriver;
pub mod error;
pub mod fem;
pub mod geom;
pub mod io;
pub mod materials;

// Prelude
pub use boundary::{BoundaryCondition, BoundaryKind};
pub use bridge::WriteOptions;
pub use config::DeriverConfig;
pub use db::{Category, GeomDb, Sense, SetHandle};
pub use deriver::{GeometryDeriver, UpdateSummary, VolumeInfo};
pub use error::{GeomError, Result};
pub use fem::{FeMesh, FieldSystem};
pub use geom::point::Point;
pub use geom::vector::Vector;
pub use materials::{MaterialLibrary, MaterialSpec};
