//! Material partition of the mesh blocks and lookup of transport
//! material ids.
use crate::error::{GeomError, Result};
use crate::fem::mesh::BlockId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Material id returned for void regions.
pub const MATERIAL_VOID: i32 = -1;

/// Material name used for the graveyard group.
pub const GRAVEYARD: &str = "Graveyard";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialSpec {
    pub name: String,
    pub blocks: Vec<BlockId>,
    /// Reference density, required when binning by density.
    #[serde(default)]
    pub density: Option<f64>,
}

impl MaterialSpec {
    pub fn new(name: &str, blocks: &[BlockId]) -> Self {
        Self {
            name: name.to_string(),
            blocks: blocks.to_vec(),
            density: None,
        }
    }

    pub fn with_density(mut self, density: f64) -> Self {
        self.density = Some(density);
        self
    }
}

/// Validated assignment of every mesh block to exactly one material.
#[derive(Debug, Clone)]
pub struct MaterialPartition {
    materials: Vec<MaterialSpec>,
    by_block: HashMap<BlockId, usize>,
}

impl MaterialPartition {
    pub fn new(materials: &[MaterialSpec], mesh_blocks: &BTreeSet<BlockId>) -> Result<Self> {
        if materials.is_empty() {
            return Err(GeomError::MaterialPartition("no materials given".into()));
        }
        let mut by_block = HashMap::new();
        let mut names = BTreeSet::new();
        for (i, mat) in materials.iter().enumerate() {
            if mat.name.is_empty() {
                return Err(GeomError::MaterialPartition(format!("material {i} has no name")));
            }
            if !names.insert(mat.name.as_str()) {
                return Err(GeomError::MaterialPartition(format!(
                    "material '{}' is listed twice",
                    mat.name
                )));
            }
            for &block in &mat.blocks {
                if let Some(other) = by_block.insert(block, i) {
                    return Err(GeomError::MaterialPartition(format!(
                        "block {block} belongs to both '{}' and '{}'",
                        materials[other].name, mat.name
                    )));
                }
                if !mesh_blocks.contains(&block) {
                    log::warn!("Block {block} of material '{}' is not in the mesh", mat.name);
                }
            }
        }
        if let Some(block) = mesh_blocks.iter().find(|b| !by_block.contains_key(b)) {
            return Err(GeomError::MaterialPartition(format!(
                "mesh block {block} has no material"
            )));
        }
        Ok(Self {
            materials: materials.to_vec(),
            by_block,
        })
    }

    pub fn n_materials(&self) -> usize {
        self.materials.len()
    }

    pub fn materials(&self) -> &[MaterialSpec] {
        &self.materials
    }

    pub fn material(&self, index: usize) -> Option<&MaterialSpec> {
        self.materials.get(index)
    }

    /// Index of the material owning `block`.
    pub fn material_of(&self, block: BlockId) -> Option<usize> {
        self.by_block.get(&block).copied()
    }
}

/// Name of the group holding volumes of one material (and density bin).
pub fn group_name(material: &str, density_bin: Option<usize>) -> String {
    match density_bin {
        Some(bin) => format!("mat:{material}_{bin}"),
        None => format!("mat:{material}"),
    }
}

/// Whether a material name denotes empty space.
pub fn is_void(name: &str) -> bool {
    ["void", "vacuum", "graveyard"]
        .iter()
        .any(|v| name.eq_ignore_ascii_case(v))
}

/// Transport-side material ids, keyed either by `"<name>/<density>"` or by
/// name alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MaterialLibrary {
    Structured(HashMap<String, i32>),
    Flat(HashMap<String, i32>),
}

impl MaterialLibrary {
    /// Key of a density-specific entry in a structured library.
    pub fn structured_key(name: &str, density: f64) -> String {
        format!("{name}/{density}")
    }

    /// Material id for a volume of material `name`, at `density` when the
    /// volume has a binned density. Void materials map to [`MATERIAL_VOID`].
    pub fn resolve(&self, name: &str, density: Option<f64>) -> Result<i32> {
        if is_void(name) {
            return Ok(MATERIAL_VOID);
        }
        let found = match (self, density) {
            (Self::Structured(ids), Some(d)) => ids
                .get(&Self::structured_key(name, d))
                .or_else(|| ids.get(name)),
            (Self::Structured(ids), None) | (Self::Flat(ids), _) => ids.get(name),
        };
        found
            .copied()
            .ok_or_else(|| GeomError::UnknownMaterial(name.to_string()))
    }
}
