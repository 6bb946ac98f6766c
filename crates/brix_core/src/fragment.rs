//! Polygon soup produced by the geometry builder.

use brix_math::{Bounds, Mat4, Mat4Ext, Vec3};

use crate::color::{ResolvedColor, AMBIENT_CODE};

/// Classification label carried per polygon.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Provenance {
    /// No label yet; filled in by the first enclosing reference
    #[default]
    Unset,
    Base,
    /// Printed decal geometry
    Print,
    Stud,
    StudInstance,
    Stud2Instance,
    Logo,
    /// Structural edge polyline
    Edge,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Provenance::Unset => "",
            Provenance::Base => "base",
            Provenance::Print => "print",
            Provenance::Stud => "stud",
            Provenance::StudInstance => "stud-instance",
            Provenance::Stud2Instance => "stud2-instance",
            Provenance::Logo => "logo",
            Provenance::Edge => "edge",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PolygonKind {
    /// Closed, filled polygon (triangle or quad)
    Face,
    /// Open polyline (structural edge)
    Polyline,
}

/// One polygon with its fixed attribute record.
#[derive(Clone, Debug, PartialEq)]
pub struct Polygon {
    pub kind: PolygonKind,
    pub positions: Vec<Vec3>,
    pub rgb: Vec3,
    /// True when the color came from an explicit code rather than inheritance
    pub is_static: bool,
    /// Material category ordinal
    pub category: usize,
    pub provenance: Provenance,
    /// Effective color code; 16 while still unpainted
    pub code: u32,
}

impl Polygon {
    pub fn face(positions: Vec<Vec3>, color: &ResolvedColor, provenance: Provenance) -> Self {
        Self {
            kind: PolygonKind::Face,
            positions,
            rgb: color.rgb,
            is_static: color.is_static,
            category: color.category,
            provenance,
            code: color.code,
        }
    }

    /// Black open polyline. Never takes part in color inheritance.
    pub fn polyline(positions: Vec<Vec3>, category: usize) -> Self {
        Self {
            kind: PolygonKind::Polyline,
            positions,
            rgb: Vec3::ZERO,
            is_static: false,
            category,
            provenance: Provenance::Edge,
            code: 0,
        }
    }

    pub fn is_unpainted(&self) -> bool {
        self.kind == PolygonKind::Face && self.code == AMBIENT_CODE
    }

    /// Newell normal, oriented by vertex order. Zero for degenerate faces.
    pub fn normal(&self) -> Vec3 {
        let n = self.positions.len();
        let mut normal = Vec3::ZERO;
        for i in 0..n {
            let a = self.positions[i];
            let b = self.positions[(i + 1) % n];
            normal.x += (a.y - b.y) * (a.z + b.z);
            normal.y += (a.z - b.z) * (a.x + b.x);
            normal.z += (a.x - b.x) * (a.y + b.y);
        }
        normal.normalize_or_zero()
    }
}

/// Ordered collection of polygons in one coordinate space.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GeometryFragment {
    polygons: Vec<Polygon>,
}

impl GeometryFragment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, polygon: Polygon) {
        self.polygons.push(polygon);
    }

    /// Append another fragment, keeping its order.
    pub fn append(&mut self, other: GeometryFragment) {
        self.polygons.extend(other.polygons);
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub fn iter(&self) -> impl Iterator<Item = &Polygon> {
        self.polygons.iter()
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }

    pub fn face_count(&self) -> usize {
        self.polygons
            .iter()
            .filter(|p| p.kind == PolygonKind::Face)
            .count()
    }

    pub fn polyline_count(&self) -> usize {
        self.len() - self.face_count()
    }

    /// Move every vertex by `transform`.
    pub fn transform(&mut self, transform: &Mat4) {
        for polygon in &mut self.polygons {
            transform.transform_points(&mut polygon.positions);
        }
    }

    /// Paint every unpainted (code 16) face with `color`.
    ///
    /// Provenance is only filled in where it is still [`Provenance::Unset`].
    pub fn paint_ambient(&mut self, color: &ResolvedColor, provenance: Provenance) {
        for polygon in self.polygons.iter_mut().filter(|p| p.is_unpainted()) {
            polygon.rgb = color.rgb;
            polygon.is_static = color.is_static;
            polygon.category = color.category;
            polygon.code = color.code;
            if polygon.provenance == Provenance::Unset {
                polygon.provenance = provenance;
            }
        }
    }

    pub fn bounds(&self) -> Bounds {
        let mut bounds = Bounds::empty();
        for point in self.polygons.iter().flat_map(|p| &p.positions) {
            bounds.include(*point);
        }
        bounds
    }

    /// Number of faces carrying each provenance tag.
    pub fn count_by_provenance(&self, provenance: Provenance) -> usize {
        self.polygons
            .iter()
            .filter(|p| p.provenance == provenance)
            .count()
    }
}
