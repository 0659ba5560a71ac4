use crate::fem::mesh::{ElemId, ElementKind};
use thiserror::Error;

/// Errors raised while deriving or querying geometry.
#[derive(Debug, Error)]
pub enum GeomError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("element {id} is a {kind:?}; only tetrahedral meshes can be converted")]
    UnsupportedElement { id: ElemId, kind: ElementKind },

    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("invalid material partition: {0}")]
    MaterialPartition(String),

    #[error("relative density {value} of element {elem} is outside [{min}, {max}]")]
    DensityOutOfRange {
        elem: ElemId,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("non-finite value {value} of '{variable}' on element {elem}")]
    NonFiniteField {
        elem: ElemId,
        variable: String,
        value: f64,
    },

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("unknown element {0}")]
    UnknownElement(ElemId),

    #[error("point {0} is not inside any element")]
    PointNotLocated(String),

    #[error("result array has {got} entries but {expected} tetrahedra are mapped")]
    ResultSizeMismatch { expected: usize, got: usize },

    #[error("no element owns tetrahedron handle {0}")]
    UnresolvedHandle(usize),

    #[error("degree of freedom {0} was written more than once")]
    DuplicateDof(usize),

    #[error("region of {n_tets} tetrahedra has an empty skin")]
    EmptySkin { n_tets: usize },

    #[error("face {0:?} is shared by more than two tetrahedra")]
    NonManifoldFace([usize; 3]),

    #[error("unknown entity set {0}")]
    UnknownSet(usize),

    #[error("volume {0} has no temperature assigned")]
    NoTemperature(usize),

    #[error("unknown material '{0}'")]
    UnknownMaterial(String),

    #[error("unsupported boundary condition '{0}'")]
    UnsupportedBoundary(String),

    #[error("unknown side set '{0}'")]
    UnknownSideSet(String),

    #[error("{0} failed on another rank")]
    RemoteFailure(&'static str),

    #[error("geometry has not been initialised; call init() first")]
    NotInitialised,

    #[error("topology check failed: {0}")]
    Topology(String),
}

pub type Result<T> = std::result::Result<T, GeomError>;
