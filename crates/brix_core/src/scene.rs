//! Scene assembly.
//!
//! A [`Scene`] holds one [`Prototype`] per unique part of a model and one
//! [`Instance`] per placement. Prototypes are built unpainted; instances
//! carry the color that paints them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use brix_math::{Bounds, Mat4, Mat4Ext};
use rayon::prelude::*;

use crate::builder::{BuildError, BuildResult};
use crate::cache::SubpartCache;
use crate::color::{ColorToken, ResolvedColor};
use crate::config::Session;
use crate::diagnostics::Diagnostics;
use crate::fragment::{GeometryFragment, Provenance};
use crate::model::Model;
use crate::part::{build_part, PartMesh, PartOptions};

/// A built part shared by all of its instances.
#[derive(Clone, Debug)]
pub struct Prototype {
    /// Unique identifier within the scene
    pub id: usize,

    /// Part reference, e.g. `3001.dat`
    pub name: String,

    /// Shared part geometry
    pub mesh: Arc<PartMesh>,

    /// Local bounding box
    pub bounds: Bounds,
}

impl Prototype {
    pub fn new(id: usize, name: String, mesh: Arc<PartMesh>) -> Self {
        let bounds = mesh.fragment.bounds();
        Self {
            id,
            name,
            mesh,
            bounds,
        }
    }
}

/// A placed prototype.
#[derive(Clone, Debug)]
pub struct Instance {
    /// Index of the prototype this instance references
    pub prototype_id: usize,

    /// Model-space transform. May mirror, so it is kept as a matrix.
    pub transform: Mat4,

    /// Color painted onto the prototype's unpainted faces
    pub color: ResolvedColor,

    /// Submodel that placed it
    pub submodel: Option<String>,
}

/// A complete model scene.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    /// Shared prototype definitions
    pub prototypes: Vec<Arc<Prototype>>,

    /// Instances referencing prototypes
    pub instances: Vec<Instance>,

    /// Non-fatal conditions met while loading the model and building its prototypes
    pub diagnostics: Diagnostics,

    /// Scene name (usually from filename)
    pub name: String,
}

impl Scene {
    /// Create an empty scene.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Add a prototype to the scene and return its ID.
    pub fn add_prototype(&mut self, name: String, mesh: PartMesh) -> usize {
        let id = self.prototypes.len();
        self.prototypes
            .push(Arc::new(Prototype::new(id, name, Arc::new(mesh))));
        id
    }

    pub fn add_instance(&mut self, instance: Instance) {
        self.instances.push(instance);
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn prototype_count(&self) -> usize {
        self.prototypes.len()
    }

    /// Faces across all instances.
    pub fn total_face_count(&self) -> usize {
        self.instanced(|p| p.mesh.fragment.face_count())
    }

    /// Faces and edge polylines across all instances.
    pub fn total_polygon_count(&self) -> usize {
        self.instanced(|p| p.mesh.fragment.len())
    }

    fn instanced(&self, count: impl Fn(&Prototype) -> usize) -> usize {
        self.instances
            .iter()
            .filter_map(|i| self.prototypes.get(i.prototype_id))
            .map(|p| count(p))
            .sum()
    }

    /// Bounding box of all instances in model space.
    pub fn world_bounds(&self) -> Bounds {
        self.instances
            .iter()
            .filter_map(|i| {
                self.prototypes
                    .get(i.prototype_id)
                    .map(|p| i.transform.transform_bounds(&p.bounds))
            })
            .fold(Bounds::empty(), |acc, b| acc.union(&b))
    }

    /// All instances painted and moved into model space, in instance order.
    pub fn flatten(&self) -> GeometryFragment {
        let mut out = GeometryFragment::new();
        for instance in &self.instances {
            let Some(prototype) = self.prototypes.get(instance.prototype_id) else {
                continue;
            };
            let mut fragment = prototype.mesh.fragment.clone();
            fragment.paint_ambient(&instance.color, Provenance::Base);
            fragment.transform(&instance.transform);
            out.append(fragment);
        }
        out
    }
}

/// Builds a [`Scene`] from a [`Model`].
///
/// Unique parts are built in parallel, each with its own cache.
pub struct SceneBuilder<'a> {
    session: &'a Session,
    options: PartOptions,
    cancel: Option<&'a AtomicBool>,
}

impl<'a> SceneBuilder<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self {
            session,
            options: PartOptions::default(),
            cancel: None,
        }
    }

    pub fn with_options(mut self, options: PartOptions) -> Self {
        self.options = options;
        self
    }

    /// Checked before each part build; set it to stop early.
    pub fn with_cancel_flag(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
    }

    pub fn build(&self, model: &Model) -> BuildResult<Scene> {
        let parts = model.unique_parts();

        let built: Vec<(PartMesh, Diagnostics)> = parts
            .par_iter()
            .map(|name| {
                if self.cancelled() {
                    return Err(BuildError::Cancelled);
                }
                let mut cache = SubpartCache::new();
                let mut diagnostics = Diagnostics::new();
                let mesh = build_part(self.session, name, &self.options, &mut cache, &mut diagnostics)?;
                Ok((mesh, diagnostics))
            })
            .collect::<BuildResult<_>>()?;

        let mut scene = Scene::new(model.name());
        scene.diagnostics.merge(model.diagnostics().clone());
        let mut ids = HashMap::new();
        for (name, (mesh, diagnostics)) in parts.iter().zip(built) {
            scene.diagnostics.merge(diagnostics);
            let id = scene.add_prototype(name.to_string(), mesh);
            ids.insert(name.to_lowercase(), id);
        }

        let resolver = self.session.resolver(self.options.material_code);
        for placement in model.placements() {
            let Some(&prototype_id) = ids.get(&placement.part.to_lowercase()) else {
                continue;
            };
            scene.add_instance(Instance {
                prototype_id,
                transform: placement.transform,
                color: resolver.resolve(&placement.color, &ColorToken::Ambient),
                submodel: placement.submodel.clone(),
            });
        }

        log::info!(
            "Built scene '{}': {} prototypes, {} instances, {} faces",
            scene.name,
            scene.prototype_count(),
            scene.instance_count(),
            scene.total_face_count()
        );
        Ok(scene)
    }
}
