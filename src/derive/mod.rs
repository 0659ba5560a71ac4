//! Stages of the geometry derivation, from element binning to the
//! assembled topology.
pub mod binning;
pub mod graveyard;
pub mod regions;
pub mod skin;
pub mod sorter;
pub mod surfaces;
pub mod topology;

pub use binning::{BinSlot, Binning, BinningConfig, LinearBinning, LogBinning, RelativeDensityBinning};
pub use skin::Skin;
pub use sorter::{BinLayout, BinnedElements};
pub use topology::Topology;
