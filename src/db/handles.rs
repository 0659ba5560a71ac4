use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub usize);

        impl $name {
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

handle!(
    /// Vertex in the geometry database.
    VertexHandle
);
handle!(
    /// Linear tetrahedron in the geometry database.
    TetHandle
);
handle!(
    /// Triangle facet. A facet exists at most once per vertex triple.
    TriHandle
);
handle!(
    /// Entity set: a group, volume or surface.
    SetHandle
);
