pub mod snapshot;
pub mod stl;

pub use snapshot::{GeometrySnapshot, SnapshotWriter, read_snapshot, write_snapshot};
pub use stl::{StlFormat, TriangleSoup, read_stl, write_surfaces_stl};
