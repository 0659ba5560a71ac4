//! STL export of derived surfaces.
//!
//! STL keeps only raw triangles, so volumes, senses and groups are lost.
//! The ASCII variant writes one `solid` block per surface.

use crate::db::{Category, GeomDb, SetHandle};
use crate::geom::point::Point;
use crate::geom::triangles::triangle_normal;
use crate::geom::vector::Vector;
use anyhow::{Context, Result, bail};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// STL file format variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StlFormat {
    /// ASCII text format (human-readable, larger file size)
    Ascii,
    /// Binary format (compact, faster to read/write)
    Binary,
}

/// Triangles read back from an STL file, with shared vertices merged.
#[derive(Debug, Clone, Default)]
pub struct TriangleSoup {
    pub vertices: Vec<Point>,
    pub triangles: Vec<[usize; 3]>,
}

/// Writes the facets of every surface in `db` to an STL file.
pub fn write_surfaces_stl(path: &Path, db: &GeomDb, format: StlFormat) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create file: {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    let surfaces = db.sets(Category::Surface);
    match format {
        StlFormat::Ascii => write_ascii(&mut writer, db, &surfaces),
        StlFormat::Binary => write_binary(&mut writer, db, &surfaces),
    }
    .with_context(|| format!("Failed to write STL: {}", path.display()))?;
    writer.flush()?;
    Ok(())
}

fn facets(db: &GeomDb, surface: SetHandle) -> Result<Vec<([Point; 3], Vector)>> {
    Ok(db
        .set(surface)?
        .triangles()
        .iter()
        .map(|&t| {
            let [p0, p1, p2] = db.triangle_points(t);
            let normal = triangle_normal(p0, p1, p2)
                .normalize()
                .unwrap_or(Vector::new(0.0, 0.0, 1.0));
            ([p0, p1, p2], normal)
        })
        .collect())
}

fn write_ascii(writer: &mut impl Write, db: &GeomDb, surfaces: &[SetHandle]) -> Result<()> {
    for &surf in surfaces {
        let name = format!("surface_{}", db.set(surf)?.global_id());
        writeln!(writer, "solid {name}")?;
        for (pts, n) in facets(db, surf)? {
            writeln!(writer, "  facet normal {} {} {}", n.dx, n.dy, n.dz)?;
            writeln!(writer, "    outer loop")?;
            for p in pts {
                writeln!(writer, "      vertex {} {} {}", p.x, p.y, p.z)?;
            }
            writeln!(writer, "    endloop")?;
            writeln!(writer, "  endfacet")?;
        }
        writeln!(writer, "endsolid {name}")?;
    }
    Ok(())
}

fn write_binary(writer: &mut impl Write, db: &GeomDb, surfaces: &[SetHandle]) -> Result<()> {
    let mut all = Vec::new();
    for &surf in surfaces {
        all.extend(facets(db, surf)?);
    }

    // 80-byte header
    let mut header = [0u8; 80];
    let text = b"binary STL - derived surfaces";
    header[..text.len()].copy_from_slice(text);
    writer.write_all(&header)?;
    writer.write_all(&(all.len() as u32).to_le_bytes())?;

    for (pts, n) in all {
        for v in [n.dx, n.dy, n.dz] {
            writer.write_all(&(v as f32).to_le_bytes())?;
        }
        for p in pts {
            for v in [p.x, p.y, p.z] {
                writer.write_all(&(v as f32).to_le_bytes())?;
            }
        }
        // Attribute byte count (unused)
        writer.write_all(&0u16.to_le_bytes())?;
    }
    Ok(())
}

/// Reads the triangles of an ASCII or binary STL file.
pub fn read_stl(path: &Path) -> Result<TriangleSoup> {
    let mut bytes = Vec::new();
    File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?
        .read_to_end(&mut bytes)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]).to_string();
    if head.trim_start().starts_with("solid") && (head.contains("facet") || head.contains("endsolid")) {
        read_ascii(&bytes)
    } else {
        read_binary(&bytes)
    }
    .with_context(|| format!("Invalid STL file: {}", path.display()))
}

fn read_ascii(bytes: &[u8]) -> Result<TriangleSoup> {
    let mut soup = TriangleSoup::default();
    let mut vertex_map = HashMap::new();
    let mut current: Vec<Point> = Vec::new();

    for line in BufReader::new(bytes).lines() {
        let line = line?;
        let trimmed = line.trim();
        if let Some(rest) = trimmed.strip_prefix("vertex") {
            let c: Vec<f64> = rest
                .split_whitespace()
                .map(str::parse)
                .collect::<std::result::Result<_, _>>()
                .context("Invalid vertex coordinates")?;
            if c.len() != 3 {
                bail!("Vertex with {} coordinates", c.len());
            }
            current.push(Point::new(c[0], c[1], c[2]));
        } else if trimmed.starts_with("endloop") {
            if current.len() != 3 {
                bail!("Facet with {} vertices", current.len());
            }
            let tri = [0, 1, 2].map(|i| add_dedup_vertex(&mut vertex_map, &mut soup.vertices, current[i]));
            soup.triangles.push(tri);
            current.clear();
        }
    }
    Ok(soup)
}

fn read_binary(bytes: &[u8]) -> Result<TriangleSoup> {
    if bytes.len() < 84 {
        bail!("Binary STL shorter than its header");
    }
    let n = u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as usize;
    if bytes.len() < 84 + 50 * n {
        bail!("Binary STL truncated: expected {n} triangles");
    }

    let f32_at = |offset: usize| {
        f32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ]) as f64
    };

    let mut soup = TriangleSoup::default();
    let mut vertex_map = HashMap::new();
    for t in 0..n {
        // Skip the normal
        let base = 84 + 50 * t + 12;
        let tri = [0, 1, 2].map(|k| {
            let o = base + 12 * k;
            let p = Point::new(f32_at(o), f32_at(o + 4), f32_at(o + 8));
            add_dedup_vertex(&mut vertex_map, &mut soup.vertices, p)
        });
        soup.triangles.push(tri);
    }
    Ok(soup)
}

const STL_DEDUP_SCALE: f64 = 1e9;

fn stl_vertex_key(p: Point) -> (i64, i64, i64) {
    (
        (p.x * STL_DEDUP_SCALE).round() as i64,
        (p.y * STL_DEDUP_SCALE).round() as i64,
        (p.z * STL_DEDUP_SCALE).round() as i64,
    )
}

fn add_dedup_vertex(
    map: &mut HashMap<(i64, i64, i64), usize>,
    vertices: &mut Vec<Point>,
    p: Point,
) -> usize {
    *map.entry(stl_vertex_key(p)).or_insert_with(|| {
        vertices.push(p);
        vertices.len() - 1
    })
}
