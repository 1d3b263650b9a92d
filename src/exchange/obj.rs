/// obj.rs
/// -----------
/// Wavefront OBJ export of a refined triangulation, plus a reader for the
/// subset this crate writes (`v`, `vt` and triangular `f` lines). The
/// writer applies the triangulation's georeferencing transform to the
/// projected coordinates, emits per-vertex texture coordinates normalised
/// to the unit square of the x/y extents, and reverses the triangle
/// winding so normals face outward in a y-down raster.
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{anyhow, Result};
use itertools::Itertools;
use nalgebra::{Affine2, Point2, Point3, Vector2};
use rayon::prelude::*;

use crate::triangulation::Triangulation;

/// Write the mesh as OBJ to a file.
pub fn write_obj(tin: &Triangulation, path: impl AsRef<Path>) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);
    write_obj_to(tin, &mut out)
}

/// Write the mesh as OBJ to any sink.
pub fn write_obj_to<W: Write>(tin: &Triangulation, out: &mut W) -> Result<()> {
    let affine = tin
        .affine()
        .copied()
        .unwrap_or_else(Affine2::identity);

    let coords: Vec<Point3<f64>> = tin
        .vertices()
        .iter()
        .map(|v| {
            let p = affine * Point2::new(v.x as f64, v.y as f64);
            Point3::new(p.x, p.y, v.z)
        })
        .collect();

    let (min_x, max_x) = coords
        .iter()
        .map(|p| p.x)
        .minmax()
        .into_option()
        .ok_or_else(|| anyhow!("mesh has no vertices"))?;
    let (min_y, max_y) = coords
        .iter()
        .map(|p| p.y)
        .minmax()
        .into_option()
        .ok_or_else(|| anyhow!("mesh has no vertices"))?;
    let span_x = if max_x > min_x { max_x - min_x } else { 1.0 };
    let span_y = if max_y > min_y { max_y - min_y } else { 1.0 };

    for p in &coords {
        writeln!(out, "v {:.3} {:.3} {:.3}", p.x, p.y, p.z)?;
    }
    for p in &coords {
        writeln!(
            out,
            "vt {:.3} {:.3}",
            (p.x - min_x) / span_x,
            (p.y - min_y) / span_y
        )?;
    }
    for t in tin.triangles() {
        let [a, b, c] = t.vertex_indices();
        // reversed winding, 1-based, with the texture index riding along
        let (i, j, k) = (c + 1, b + 1, a + 1);
        writeln!(out, "f {}/{}/ {}/{}/ {}/{}/", i, i, j, j, k, k)?;
    }
    Ok(())
}

/// One parsed OBJ line. Lines are independent, so a file parses in
/// parallel.
#[derive(Debug, PartialEq)]
enum ObjLine {
    // A vertex position
    V(Point3<f64>),
    // A vertex UV texture coordinate
    Vt(Vector2<f64>),
    // A face as 1-based vertex indices
    F(Vec<usize>),
    // Anything we don't care about
    Ignore,
}

impl ObjLine {
    fn from_line(line: &str) -> Self {
        // drop comments, then split cleanly
        let parts: Vec<&str> = line
            .split('#')
            .next()
            .unwrap_or_default()
            .split_whitespace()
            .collect();

        match parts.as_slice() {
            ["v", x, y, z] => match (x.parse(), y.parse(), z.parse()) {
                (Ok(x), Ok(y), Ok(z)) => ObjLine::V(Point3::new(x, y, z)),
                _ => ObjLine::Ignore,
            },
            ["vt", u, v, _garbage @ ..] => match (u.parse(), v.parse()) {
                (Ok(u), Ok(v)) => ObjLine::Vt(Vector2::new(u, v)),
                _ => ObjLine::Ignore,
            },
            ["f", blob @ ..] => ObjLine::F(
                // supports face references like 1/2/3, 1//3, 1/2 and 1;
                // only the leading vertex index matters here
                blob.iter()
                    .filter_map(|f| f.split('/').next()?.parse::<usize>().ok())
                    .collect(),
            ),
            _ => ObjLine::Ignore,
        }
    }
}

/// The mesh data this crate's OBJ output round-trips through.
#[derive(Debug, Default)]
pub struct ObjTin {
    pub vertices: Vec<Point3<f64>>,
    pub uv: Vec<Vector2<f64>>,
    pub faces: Vec<(usize, usize, usize)>,
}

impl ObjTin {
    /// Parse OBJ text into vertex, texture and triangle lists.
    pub fn from_string(data: &str) -> Result<Self> {
        let lines: Vec<ObjLine> = data
            .lines()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(ObjLine::from_line)
            .collect();

        let mut mesh = ObjTin::default();
        for line in lines {
            match line {
                ObjLine::V(p) => mesh.vertices.push(p),
                ObjLine::Vt(t) => mesh.uv.push(t),
                ObjLine::F(raw) => match raw.as_slice() {
                    [a, b, c] => mesh.faces.push((a - 1, b - 1, c - 1)),
                    _ => return Err(anyhow!("face is not a triangle: {raw:?}")),
                },
                ObjLine::Ignore => (),
            }
        }
        Ok(mesh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::relative_eq;
    use nalgebra::{DMatrix, Matrix3};

    use crate::geometry::EPS;

    fn refined_fixture() -> Triangulation {
        let dem = DMatrix::from_row_slice(
            3,
            3,
            &[0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0],
        );
        let mut tin = Triangulation::new(dem, 0).unwrap();
        loop {
            let (error, count) = tin.insert_next().unwrap();
            if error <= EPS || count >= 9 {
                break;
            }
        }
        tin
    }

    fn canonical(face: (usize, usize, usize)) -> [usize; 3] {
        let mut f = [face.0, face.1, face.2];
        f.sort();
        f
    }

    #[test]
    fn test_parse_line() {
        assert_eq!(
            ObjLine::from_line("v 1.0 2.0 3.5"),
            ObjLine::V(Point3::new(1.0, 2.0, 3.5))
        );
        assert_eq!(
            ObjLine::from_line("vt 0.25 1.0"),
            ObjLine::Vt(Vector2::new(0.25, 1.0))
        );
        assert_eq!(
            ObjLine::from_line("f 3/3/ 2/2/ 1/1/"),
            ObjLine::F(vec![3, 2, 1])
        );
        assert_eq!(ObjLine::from_line("# just a comment"), ObjLine::Ignore);
        assert_eq!(ObjLine::from_line("usemtl terrain"), ObjLine::Ignore);
    }

    #[test]
    fn test_writer_shape() {
        let tin = refined_fixture();
        let mut buffer = Vec::new();
        write_obj_to(&tin, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert_eq!(text.matches("\nv ").count() + 1, tin.vertex_count());
        assert_eq!(text.matches("vt ").count(), tin.vertex_count());
        assert_eq!(text.matches("f ").count(), tin.triangle_count());

        // texture coordinates normalise into the unit square
        let parsed = ObjTin::from_string(&text).unwrap();
        for t in &parsed.uv {
            assert!((0.0..=1.0).contains(&t.x));
            assert!((0.0..=1.0).contains(&t.y));
        }
    }

    #[test]
    fn test_round_trip() {
        let tin = refined_fixture();
        let mut buffer = Vec::new();
        write_obj_to(&tin, &mut buffer).unwrap();
        let parsed = ObjTin::from_string(&String::from_utf8(buffer).unwrap()).unwrap();

        // the vertex list survives in order, within the %.3f precision
        assert_eq!(parsed.vertices.len(), tin.vertex_count());
        for (read, vert) in parsed.vertices.iter().zip(tin.vertices()) {
            assert!(relative_eq!(read.x, vert.x as f64, epsilon = 1e-3));
            assert!(relative_eq!(read.y, vert.y as f64, epsilon = 1e-3));
            assert!(relative_eq!(read.z, vert.z, epsilon = 1e-3));
        }

        // the triangle set survives up to winding
        let mut written: Vec<[usize; 3]> = tin
            .triangles()
            .map(|t| {
                let [a, b, c] = t.vertex_indices();
                canonical((a, b, c))
            })
            .collect();
        let mut read: Vec<[usize; 3]> = parsed.faces.iter().map(|&f| canonical(f)).collect();
        written.sort();
        read.sort();
        assert_eq!(written, read);
    }

    #[test]
    fn test_affine_applies_to_projection() {
        let dem = DMatrix::from_element(4, 4, 2.0);
        let affine = Affine2::from_matrix_unchecked(Matrix3::new(
            10.0, 0.0, 100.0, //
            0.0, -10.0, 50.0, //
            0.0, 0.0, 1.0,
        ));
        let tin = Triangulation::with_affine(dem, 0, affine).unwrap();

        let mut buffer = Vec::new();
        write_obj_to(&tin, &mut buffer).unwrap();
        let parsed = ObjTin::from_string(&String::from_utf8(buffer).unwrap()).unwrap();

        // corner (0, 0) maps through the transform, elevation untouched
        assert!(relative_eq!(parsed.vertices[0].x, 100.0, epsilon = 1e-9));
        assert!(relative_eq!(parsed.vertices[0].y, 50.0, epsilon = 1e-9));
        assert!(relative_eq!(parsed.vertices[0].z, 2.0, epsilon = 1e-9));
        // corner (3, 3) lands at (130, 20)
        assert!(relative_eq!(parsed.vertices[2].x, 130.0, epsilon = 1e-9));
        assert!(relative_eq!(parsed.vertices[2].y, 20.0, epsilon = 1e-9));
    }
}
