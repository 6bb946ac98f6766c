//! Building a single named part, with print handling.
//!
//! Printed parts (`3001p01`) can be built as they are, split into the print
//! decal plus the plain base part (`3001`), or built plain with a texture
//! path recorded for the decal.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::builder::{BuildContext, BuildOptions, BuildResult};
use crate::cache::SubpartCache;
use crate::color::BaseMaterial;
use crate::config::Session;
use crate::diagnostics::Diagnostics;
use crate::fragment::{GeometryFragment, Provenance};

/// How printed parts are handled.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PrintMode {
    /// Build the printed part as one piece
    #[default]
    Combined,
    /// Print geometry from the printed part, everything else from the base part
    Separate,
    /// Base part only; the print comes from a texture
    Texture,
}

/// Options for [`build_part`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartOptions {
    pub print_mode: PrintMode,
    /// Color code of the base material used for unpainted faces
    pub material_code: u32,
    pub build: BuildOptions,
}

impl Default for PartOptions {
    fn default() -> Self {
        Self {
            print_mode: PrintMode::Combined,
            material_code: 15,
            build: BuildOptions::default(),
        }
    }
}

/// A part name taken apart into its print components.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartName {
    /// Requested name without `.dat`
    pub name: String,
    /// Print suffix, from the first `p`/`P` on
    pub print: Option<String>,
    /// Name of the unprinted part
    pub base: String,
    /// Composite parts contain a `c`/`C`; their base may not exist
    pub composite: bool,
}

impl PartName {
    pub fn parse(name: &str) -> Self {
        let name = strip_dat(name.trim()).to_string();
        let print = name.find(['p', 'P']).map(|i| name[i..].to_string());
        let base = match &print {
            Some(suffix) => strip_model_prefix(&name.replace(suffix.as_str(), "")),
            None => name.clone(),
        };
        let composite = name.contains(['c', 'C']);

        Self {
            name,
            print,
            base,
            composite,
        }
    }

    pub fn is_printed(&self) -> bool {
        self.print.is_some()
    }

    /// Whether the print can be built apart from its base part.
    pub fn is_separable(&self) -> bool {
        self.is_printed() && !self.composite
    }
}

fn strip_dat(name: &str) -> &str {
    let split = name.len().saturating_sub(4);
    match (name.get(..split), name.get(split..)) {
        (Some(stem), Some(ext)) if !stem.is_empty() && ext.eq_ignore_ascii_case(".dat") => stem,
        _ => name,
    }
}

/// Remove `<digits>-` runs, the model prefix unofficial MPD parts carry
/// (`1234-3001` becomes `3001`).
pub fn strip_model_prefix(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut digits = String::new();

    for c in name.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
        } else if c == '-' && !digits.is_empty() {
            digits.clear();
        } else {
            out.push_str(&digits);
            digits.clear();
            out.push(c);
        }
    }
    out.push_str(&digits);
    out
}

/// A built part, ready for a host scene.
#[derive(Clone, Debug)]
pub struct PartMesh {
    pub name: String,
    /// Header line of the part file
    pub description: Option<String>,
    pub base: BaseMaterial,
    /// Decal texture, in [`PrintMode::Texture`]
    pub texture: Option<PathBuf>,
    pub fragment: GeometryFragment,
}

/// Build a named part.
///
/// In [`PrintMode::Separate`] the cache is cleared between the print pass and
/// the base pass, which skips studs.
pub fn build_part(
    session: &Session,
    part_name: &str,
    options: &PartOptions,
    cache: &mut SubpartCache,
    diagnostics: &mut Diagnostics,
) -> BuildResult<PartMesh> {
    let parsed = PartName::parse(part_name);
    let mut fragment = GeometryFragment::new();
    let mut build_options = options.build.clone();
    let mut target = parsed.name.clone();
    let texture = (options.print_mode == PrintMode::Texture).then(|| {
        session
            .layout()
            .root()
            .join("textures")
            .join(format!("{}_basecolor.png", parsed.name))
    });

    match options.print_mode {
        PrintMode::Separate if parsed.is_separable() => {
            let builder = session.builder(options.build.clone(), options.material_code);
            let printed = builder.resolve_part(&format!("{}.dat", parsed.name));
            let print = builder.build(
                &printed,
                &BuildContext::top_level(Provenance::Print),
                cache,
                diagnostics,
            )?;
            log::debug!("Print pass of '{}': {} polygons", parsed.name, print.len());
            fragment.append(print);

            cache.clear();
            build_options.skip_studs = true;
            target = parsed.base.clone();
        }
        PrintMode::Texture if parsed.is_separable() => {
            target = parsed.base.clone();
        }
        _ => {}
    }

    let builder = session.builder(build_options, options.material_code);
    let resolved = builder.resolve_part(&format!("{}.dat", target));
    let base = builder.build(
        &resolved,
        &BuildContext::top_level(Provenance::Base),
        cache,
        diagnostics,
    )?;
    fragment.append(base);

    let description = if resolved.exists {
        read_description(&resolved.path)
    } else {
        None
    };

    log::info!(
        "Built part '{}': {} faces, {} edges",
        parsed.name,
        fragment.face_count(),
        fragment.polyline_count()
    );

    Ok(PartMesh {
        name: parsed.name,
        description,
        base: builder.colors().base(),
        texture,
        fragment,
    })
}

/// First line of a part file with its leading `0` removed.
pub fn read_description(path: &Path) -> Option<String> {
    let file = std::fs::File::open(path).ok()?;
    let mut first = String::new();
    BufReader::new(file).read_line(&mut first).ok()?;

    let description = first.trim().strip_prefix('0')?.trim();
    if description.is_empty() {
        None
    } else {
        Some(description.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestLibrary;
    use brix_math::Vec3;

    const BASE_BRICK: &str = "\
0 Brick 1 x 1
0 BFC CERTIFY CCW
4 16 0 0 0 1 0 0 1 1 0 0 1 0
1 16 0 0 0 1 0 0 0 1 0 0 0 1 stud.dat
";

    const PRINTED_BRICK: &str = "\
0 Brick 1 x 1 with Red Dot Print
0 BFC CERTIFY CCW
4 16 0 0 0 1 0 0 1 1 0 0 1 0
3 4 0 0 0 1 0 0 0 1 0
1 16 0 0 0 1 0 0 0 1 0 0 0 1 stud.dat
";

    fn library() -> TestLibrary {
        let lib = TestLibrary::new();
        lib.write("parts/3005.dat", BASE_BRICK);
        lib.write("parts/3005p01.dat", PRINTED_BRICK);
        lib.write("p/stud.dat", "4 16 0 -4 0 1 -4 0 1 -4 1 0 -4 1\n");
        lib
    }

    #[test]
    fn test_part_name_parsing() {
        let printed = PartName::parse("3005p01.dat");
        assert_eq!(printed.name, "3005p01");
        assert_eq!(printed.print.as_deref(), Some("p01"));
        assert_eq!(printed.base, "3005");
        assert!(printed.is_separable());

        let plain = PartName::parse("3001");
        assert!(!plain.is_printed());
        assert_eq!(plain.base, "3001");

        let composite = PartName::parse("3626cp01");
        assert!(composite.composite);
        assert!(!composite.is_separable());

        let prefixed = PartName::parse("1234-3005P02");
        assert_eq!(prefixed.base, "3005");
    }

    #[test]
    fn test_multibyte_names_do_not_split_characters() {
        assert_eq!(PartName::parse("x€€").name, "x€€");
        assert_eq!(PartName::parse("€.dat").name, "€");
        assert_eq!(PartName::parse("€").name, "€");
        assert_eq!(PartName::parse(".dat").name, ".dat");
    }

    #[test]
    fn test_multibyte_missing_part_builds_placeholder() {
        let lib = library();
        let session = lib.session();
        let mut diagnostics = Diagnostics::new();

        let mesh = build_part(&session, "x€€", &PartOptions::default(), &mut SubpartCache::new(), &mut diagnostics)
            .unwrap();
        assert_eq!(mesh.name, "x€€");
        assert_eq!(mesh.fragment.len(), 6);
        assert_eq!(diagnostics.missing_parts(), 1);
    }

    #[test]
    fn test_strip_model_prefix() {
        assert_eq!(strip_model_prefix("1234-3001"), "3001");
        assert_eq!(strip_model_prefix("12-34-x"), "x");
        assert_eq!(strip_model_prefix("a-b"), "a-b");
        assert_eq!(strip_model_prefix("3001"), "3001");
    }

    #[test]
    fn test_combined_build() {
        let lib = library();
        let session = lib.session();

        let mesh = build_part(
            &session,
            "3005p01",
            &PartOptions::default(),
            &mut SubpartCache::new(),
            &mut Diagnostics::new(),
        )
        .unwrap();

        assert_eq!(mesh.fragment.len(), 3);
        assert!(mesh.fragment.iter().all(|p| p.provenance == Provenance::Base));
        assert_eq!(mesh.description.as_deref(), Some("Brick 1 x 1 with Red Dot Print"));
        assert_eq!(mesh.base.rgb, Vec3::ONE);
        assert!(mesh.texture.is_none());
    }

    #[test]
    fn test_separate_build() {
        let lib = library();
        let session = lib.session();
        let options = PartOptions {
            print_mode: PrintMode::Separate,
            ..Default::default()
        };

        let mut cache = SubpartCache::new();
        let mesh = build_part(&session, "3005p01", &options, &mut cache, &mut Diagnostics::new()).unwrap();

        // Print pass keeps only the explicitly colored face; the base pass
        // keeps its own face and skips the stud
        let tags: Vec<(Provenance, u32)> = mesh.fragment.iter().map(|p| (p.provenance, p.code)).collect();
        assert_eq!(tags, vec![(Provenance::Print, 4), (Provenance::Base, 16)]);
        assert_eq!(mesh.description.as_deref(), Some("Brick 1 x 1"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_texture_build() {
        let lib = library();
        let session = lib.session();
        let options = PartOptions {
            print_mode: PrintMode::Texture,
            ..Default::default()
        };

        let mesh = build_part(&session, "3005p01", &options, &mut SubpartCache::new(), &mut Diagnostics::new())
            .unwrap();

        assert_eq!(mesh.texture, Some(lib.path("textures/3005p01_basecolor.png")));
        assert_eq!(mesh.fragment.len(), 2);
    }

    #[test]
    fn test_texture_recorded_for_unprinted_part() {
        let lib = library();
        let session = lib.session();
        let options = PartOptions {
            print_mode: PrintMode::Texture,
            ..Default::default()
        };

        let mesh = build_part(&session, "3005", &options, &mut SubpartCache::new(), &mut Diagnostics::new()).unwrap();
        assert_eq!(mesh.texture, Some(lib.path("textures/3005_basecolor.png")));
        assert_eq!(mesh.fragment.len(), 2);
    }

    #[test]
    fn test_unprinted_part_ignores_print_mode() {
        let lib = library();
        let session = lib.session();
        let options = PartOptions {
            print_mode: PrintMode::Separate,
            material_code: 4,
            ..Default::default()
        };

        let mesh = build_part(&session, "3005", &options, &mut SubpartCache::new(), &mut Diagnostics::new())
            .unwrap();
        assert_eq!(mesh.fragment.len(), 2);
        assert!(mesh.fragment.iter().all(|p| p.rgb == Vec3::new(0.5, 0.0, 0.0)));
    }

    #[test]
    fn test_missing_part_builds_placeholder() {
        let lib = library();
        let session = lib.session();
        let mut diagnostics = Diagnostics::new();

        let mesh = build_part(&session, "99999", &PartOptions::default(), &mut SubpartCache::new(), &mut diagnostics)
            .unwrap();
        assert_eq!(mesh.fragment.len(), 6);
        assert!(mesh.description.is_none());
        assert_eq!(diagnostics.missing_parts(), 1);
    }
}
