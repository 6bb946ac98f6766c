//! Recursive geometry builder.
//!
//! Walks a part file line by line, recursing into subfile references, and
//! assembles a [`GeometryFragment`]. Polygons authored with code 16 are kept
//! unpainted inside the recursion and painted at each reference site, so a
//! cached subpart can be reused under any parent color.
//!
//! Output order for one file is: its own faces, then referenced children in
//! file order, then structural edges.

use std::path::PathBuf;

use thiserror::Error;

use crate::cache::{CacheKey, SubpartCache};
use crate::color::{ColorResolver, ColorSource, ColorToken, ResolvedColor, AMBIENT_CODE};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::fragment::{GeometryFragment, Polygon, Provenance};
use crate::library::{normalize_reference, PartLocator, ResolvedPart, PLACEHOLDER_GEOMETRY};
use crate::line::{classify, LineRecord, MetaCommand};
use crate::winding::{Winding, WindingState};
use brix_math::{Mat4, Vec3};

/// Helper part substituted for `stud.dat` and `stud2.dat` when instancing studs.
pub const STUD_INSTANCE: &str = "stud-instance.dat";

/// Logo primitive used when re-activating disabled logo references.
pub const LOGO_VARIANT: &str = "logo4.dat";

/// Default ceiling on reference nesting.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Errors that abort a build.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Reference nesting deeper than {depth} at '{reference}'")]
    RecursionLimitExceeded { reference: String, depth: usize },

    #[error("Build cancelled")]
    Cancelled,
}

/// Result type for build operations.
pub type BuildResult<T> = Result<T, BuildError>;

/// Switches that change what a build produces.
///
/// A [`SubpartCache`] must only be reused between builds with equal options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuildOptions {
    /// Prefer 48-segment primitives
    pub high_res: bool,

    /// Re-activate disabled logo references as `logo4.dat`
    pub logo_variant: bool,

    /// Replace `stud.dat`/`stud2.dat` with the instancing helper
    pub stud_instances: bool,

    /// Keep structural edges (type 2 lines and `edge` primitives)
    pub edges: bool,

    /// Skip every reference whose name contains `stu`
    pub skip_studs: bool,

    /// Maximum reference nesting before the build fails
    pub max_depth: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            high_res: false,
            logo_variant: false,
            stud_instances: false,
            edges: false,
            skip_studs: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Inherited state for one part invocation.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildContext {
    pub winding: Winding,
    /// Current color of the enclosing context; `Ambient` when unpainted
    pub ambient: ColorToken,
    pub provenance: Provenance,
}

impl BuildContext {
    /// Context for a top-level build: CCW, unpainted.
    pub fn top_level(provenance: Provenance) -> Self {
        Self {
            winding: Winding::Ccw,
            ambient: ColorToken::Ambient,
            provenance,
        }
    }

    pub fn with_ambient(mut self, ambient: ColorToken) -> Self {
        self.ambient = ambient;
        self
    }

    /// Code-16 faces are dropped in this context: printed decals must not
    /// take on whatever the base brick color turns out to be.
    fn suppresses_unpainted(&self) -> bool {
        self.provenance == Provenance::Print && self.ambient.is_ambient()
    }
}

/// Per-file accumulators, merged in output order at the end.
#[derive(Default)]
struct FileGeometry {
    faces: GeometryFragment,
    children: GeometryFragment,
    edges: GeometryFragment,
}

impl FileGeometry {
    fn finish(mut self) -> GeometryFragment {
        self.faces.append(self.children);
        self.faces.append(self.edges);
        self.faces
    }
}

/// Builds geometry for parts of one library with one color table.
///
/// The builder itself is immutable; the cache and diagnostics are owned by
/// the caller and passed into every build.
#[derive(Clone, Debug)]
pub struct GeometryBuilder<'a> {
    locator: &'a PartLocator,
    colors: ColorResolver<'a>,
    options: BuildOptions,
}

impl<'a> GeometryBuilder<'a> {
    pub fn new(locator: &'a PartLocator, colors: ColorResolver<'a>, options: BuildOptions) -> Self {
        Self {
            locator,
            colors,
            options,
        }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    pub fn colors(&self) -> &ColorResolver<'a> {
        &self.colors
    }

    /// Look up a reference, honoring the high-res option.
    pub fn resolve_part(&self, reference: &str) -> ResolvedPart {
        self.locator.resolve(reference, self.options.high_res)
    }

    /// Build a resolved part.
    ///
    /// Faces still unpainted after the walk are painted with the context's
    /// ambient color, or the base material when that is code 16 as well.
    pub fn build(
        &self,
        part: &ResolvedPart,
        context: &BuildContext,
        cache: &mut SubpartCache,
        diagnostics: &mut Diagnostics,
    ) -> BuildResult<GeometryFragment> {
        if part.is_placeholder() {
            diagnostics.push(Diagnostic::MissingPart {
                reference: part.reference.clone(),
                parent: String::new(),
            });
        }

        let content = self.read_part(part)?;
        let mut fragment = self.walk(&part.reference, &content, context, 0, cache, diagnostics)?;
        self.paint_top(&mut fragment, context);
        log::debug!(
            "Built '{}': {} polygons, {} cached subparts",
            part.reference,
            fragment.len(),
            cache.len()
        );
        Ok(fragment)
    }

    /// Build in-memory part source, e.g. an MPD segment.
    pub fn build_source(
        &self,
        name: &str,
        content: &str,
        context: &BuildContext,
        cache: &mut SubpartCache,
        diagnostics: &mut Diagnostics,
    ) -> BuildResult<GeometryFragment> {
        let mut fragment = self.walk(name, content, context, 0, cache, diagnostics)?;
        self.paint_top(&mut fragment, context);
        Ok(fragment)
    }

    fn paint_top(&self, fragment: &mut GeometryFragment, context: &BuildContext) {
        let color = self.colors.resolve(&ColorToken::Ambient, &context.ambient);
        fragment.paint_ambient(&color, context.provenance);
    }

    /// Read a part file. Missing parts read the placeholder file when one is
    /// installed, else the built-in box.
    fn read_part(&self, part: &ResolvedPart) -> BuildResult<String> {
        if !part.exists && !part.path.is_file() {
            return Ok(PLACEHOLDER_GEOMETRY.to_string());
        }

        let bytes = std::fs::read(&part.path).map_err(|source| BuildError::Io {
            path: part.path.clone(),
            source,
        })?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn walk(
        &self,
        source: &str,
        content: &str,
        context: &BuildContext,
        depth: usize,
        cache: &mut SubpartCache,
        diagnostics: &mut Diagnostics,
    ) -> BuildResult<GeometryFragment> {
        let mut state = WindingState::new(context.winding);
        let mut geometry = FileGeometry::default();

        for (index, raw) in content.lines().enumerate() {
            let record = match classify(raw) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(error) => {
                    diagnostics.push(Diagnostic::MalformedLine {
                        source: source.to_string(),
                        line: index + 1,
                        error,
                    });
                    continue;
                }
            };

            match record {
                LineRecord::Meta(tokens) => {
                    if let MetaCommand::Bfc(command) = MetaCommand::parse(&tokens) {
                        state.apply(&command);
                    }

                    if !self.options.logo_variant {
                        continue;
                    }
                    let Some(line) = reactivate_logo(&tokens) else {
                        continue;
                    };
                    if let Ok(Some(LineRecord::SubfileRef {
                        color,
                        transform,
                        reference,
                    })) = classify(&line)
                    {
                        let site = ReferenceSite {
                            color: &color,
                            transform: &transform,
                            reference: &reference,
                        };
                        self.add_reference(source, site, &mut state, context, depth, &mut geometry, cache, diagnostics)?;
                    }
                }
                LineRecord::SubfileRef {
                    color,
                    transform,
                    reference,
                } => {
                    let site = ReferenceSite {
                        color: &color,
                        transform: &transform,
                        reference: &reference,
                    };
                    self.add_reference(source, site, &mut state, context, depth, &mut geometry, cache, diagnostics)?;
                }
                LineRecord::Triangle { color, points } => {
                    self.add_face(source, &color, points, &state, context, &mut geometry, diagnostics);
                }
                LineRecord::Quad { color, points } => {
                    self.add_face(source, &color, points, &state, context, &mut geometry, diagnostics);
                }
                LineRecord::Line { points } => {
                    if self.options.edges && context.provenance == Provenance::Base {
                        geometry
                            .edges
                            .push(Polygon::polyline(points.to_vec(), self.colors.base().category));
                    }
                }
            }
        }

        Ok(geometry.finish())
    }

    #[allow(clippy::too_many_arguments)]
    fn add_face<const N: usize>(
        &self,
        source: &str,
        token: &ColorToken,
        mut points: [Vec3; N],
        state: &WindingState,
        context: &BuildContext,
        geometry: &mut FileGeometry,
        diagnostics: &mut Diagnostics,
    ) {
        let color = self.resolve_color(token, source, diagnostics);
        if color.code == AMBIENT_CODE && context.suppresses_unpainted() {
            return;
        }

        state.polarity().reorder(&mut points);
        geometry
            .faces
            .push(Polygon::face(points.to_vec(), &color, context.provenance));
    }

    #[allow(clippy::too_many_arguments)]
    fn add_reference(
        &self,
        source: &str,
        site: ReferenceSite<'_>,
        state: &mut WindingState,
        context: &BuildContext,
        depth: usize,
        geometry: &mut FileGeometry,
        cache: &mut SubpartCache,
        diagnostics: &mut Diagnostics,
    ) -> BuildResult<()> {
        // Consumes a pending INVERTNEXT even when the reference is skipped below
        let winding = state.next_child(site.transform);

        let mut reference = normalize_reference(site.reference);
        let lower = reference.to_lowercase();

        if self.options.skip_studs && lower.contains("stu") {
            log::debug!("Skipping stud reference '{}' in '{}'", reference, source);
            return Ok(());
        }
        if !self.options.edges && lower.contains("edge") {
            return Ok(());
        }

        let mut provenance = context.provenance;
        if self.options.stud_instances {
            match lower.as_str() {
                "stud.dat" => {
                    reference = STUD_INSTANCE.to_string();
                    provenance = Provenance::StudInstance;
                }
                "stud2.dat" => {
                    reference = STUD_INSTANCE.to_string();
                    provenance = Provenance::Stud2Instance;
                }
                _ if lower.contains("stu") => provenance = Provenance::Stud,
                _ => {}
            }
        }
        if lower.contains("logo") {
            provenance = Provenance::Logo;
        }

        let child = BuildContext {
            winding,
            ambient: site.color.inherit(&context.ambient),
            provenance,
        };

        // Suppression depends on the real ambient color, which the key ignores
        let cacheable = !child.suppresses_unpainted();
        let key = CacheKey::new(&reference, winding, provenance);

        let cached = if cacheable {
            cache.get(&key).cloned()
        } else {
            None
        };

        // Every unresolved site is reported, cached or not
        let part = self.resolve_part(&reference);
        if part.is_placeholder() {
            diagnostics.push(Diagnostic::MissingPart {
                reference: part.reference.clone(),
                parent: source.to_string(),
            });
        }

        let mut fragment = match cached {
            Some(fragment) => fragment,
            None => {
                if depth + 1 > self.options.max_depth {
                    return Err(BuildError::RecursionLimitExceeded {
                        reference,
                        depth: self.options.max_depth,
                    });
                }

                let content = self.read_part(&part)?;
                let built = self.walk(&part.reference, &content, &child, depth + 1, cache, diagnostics)?;
                if cacheable && !built.is_empty() {
                    cache.insert(key, built.clone());
                }
                built
            }
        };

        let color = self.resolve_color(site.color, source, diagnostics);
        fragment.paint_ambient(&color, provenance);
        fragment.transform(site.transform);
        geometry.children.append(fragment);
        Ok(())
    }

    /// Resolve a token without an ambient color; code 16 stays unpainted.
    fn resolve_color(&self, token: &ColorToken, source: &str, diagnostics: &mut Diagnostics) -> ResolvedColor {
        let color = self.colors.resolve(token, &ColorToken::Ambient);
        if color.source == ColorSource::Fallback {
            diagnostics.push(Diagnostic::MissingColor {
                token: token.to_string(),
                source: source.to_string(),
            });
        }
        color
    }
}

/// The fields of one subfile reference line.
struct ReferenceSite<'r> {
    color: &'r ColorToken,
    transform: &'r Mat4,
    reference: &'r str,
}

/// Turn a disabled logo reference such as
/// `0 // 1 16 0 0 0 1 0 0 0 1 0 0 0 1 logo.dat` into an active line using
/// [`LOGO_VARIANT`]. `tokens` are the meta tokens after the `0`.
fn reactivate_logo(tokens: &[String]) -> Option<String> {
    let last = tokens.last()?;
    if tokens.len() < 2 || !last.to_lowercase().contains("logo") {
        return None;
    }

    let mut line: Vec<&str> = tokens[1..].iter().map(String::as_str).collect();
    if let Some(name) = line.last_mut() {
        *name = LOGO_VARIANT;
    }
    Some(line.join(" "))
}
