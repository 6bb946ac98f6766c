//! brix CLI - LDraw part and model builder
//!
//! Builds parts and models from an LDraw library, converts color tables and
//! unpacks MPD documents.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use brix_core::{
    build_part, BuildOptions, ColorTable, Diagnostics, GeometryFragment, LibraryConfig, LoadOptions, Model,
    MpdDocument, PartOptions, PolygonKind, PrintMode, SceneBuilder, Session, SubpartCache,
};
use brix_math::{Mat4, Vec3};
use clap::{Parser, Subcommand, ValueEnum};

/// Uniform scale from LDraw units to the host scene.
const PRESENTATION_SCALE: f32 = 0.004;

#[derive(Parser)]
#[command(name = "brix")]
#[command(about = "Build geometry from an LDraw parts library", long_about = None)]
struct Cli {
    /// JSON configuration file; the environment is used when absent
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a single part and print a summary
    Part {
        /// Part name, with or without .dat
        name: String,
        /// How printed parts are handled
        #[arg(long, value_enum, default_value_t = PrintModeArg::Combined)]
        print_mode: PrintModeArg,
        /// Base material color code for unpainted faces
        #[arg(long, default_value_t = 15)]
        material: u32,
        /// Prefer high resolution primitives
        #[arg(long)]
        high_res: bool,
        /// Emit structural edge polylines
        #[arg(long)]
        edges: bool,
        /// Re-enable commented logo references
        #[arg(long)]
        logo: bool,
        /// Replace studs with the instancing helper
        #[arg(long)]
        stud_instances: bool,
        /// Write the part as OBJ
        #[arg(long)]
        obj: Option<PathBuf>,
    },
    /// Load a model, build its scene and print a summary
    Model {
        /// Model file (.mpd, .ldr, .l3b)
        file: PathBuf,
        /// Write the flattened scene as OBJ
        #[arg(long)]
        obj: Option<PathBuf>,
        /// Rewrite inline parts already present in the unofficial library
        #[arg(long)]
        force_unofficial: bool,
    },
    /// Write the inline parts of an MPD document into the unofficial library
    Split {
        /// Input .mpd file
        file: PathBuf,
        /// Rewrite parts that already exist
        #[arg(long)]
        force: bool,
    },
    /// Convert LDConfig.ldr into a JSON color table
    Colors {
        /// Input LDConfig.ldr
        input: PathBuf,
        /// JSON table merged on top
        #[arg(long)]
        overrides: Option<PathBuf>,
        /// Output JSON file
        #[arg(short, long)]
        output: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PrintModeArg {
    Combined,
    Separate,
    Texture,
}

impl From<PrintModeArg> for PrintMode {
    fn from(arg: PrintModeArg) -> Self {
        match arg {
            PrintModeArg::Combined => PrintMode::Combined,
            PrintModeArg::Separate => PrintMode::Separate,
            PrintModeArg::Texture => PrintMode::Texture,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Warn)
        .parse_default_env()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Part {
            name,
            print_mode,
            material,
            high_res,
            edges,
            logo,
            stud_instances,
            obj,
        } => {
            let session = open_session(cli.config.as_deref())?;
            let options = PartOptions {
                print_mode: print_mode.into(),
                material_code: material,
                build: BuildOptions {
                    high_res,
                    edges,
                    logo_variant: logo,
                    stud_instances,
                    ..Default::default()
                },
            };
            run_part(&session, &name, &options, obj.as_deref())?;
        }
        Commands::Model {
            file,
            obj,
            force_unofficial,
        } => {
            let session = open_session(cli.config.as_deref())?;
            let options = LoadOptions {
                force_unofficial,
                ..Default::default()
            };
            run_model(&session, &file, &options, obj.as_deref())?;
        }
        Commands::Split { file, force } => {
            let session = open_session(cli.config.as_deref())?;
            run_split(&session, &file, force)?;
        }
        Commands::Colors {
            input,
            overrides,
            output,
        } => {
            convert_colors(&input, overrides.as_deref(), &output)?;
        }
    }

    Ok(())
}

fn open_session(config: Option<&Path>) -> Result<Session> {
    let config = match config {
        Some(path) => LibraryConfig::load(path)
            .with_context(|| format!("Failed to read configuration {}", path.display()))?,
        None => LibraryConfig::from_env().context("No --config given and environment incomplete")?,
    };
    log::info!("Using LDraw library at {}", config.ldraw_root.display());
    config.open().context("Failed to open LDraw library")
}

fn run_part(session: &Session, name: &str, options: &PartOptions, obj: Option<&Path>) -> Result<()> {
    let mut cache = SubpartCache::new();
    let mut diagnostics = Diagnostics::new();
    let mesh = build_part(session, name, options, &mut cache, &mut diagnostics)
        .with_context(|| format!("Failed to build part '{}'", name))?;

    println!("Part: {}", mesh.name);
    if let Some(description) = &mesh.description {
        println!("Description: {}", description);
    }
    println!("Faces: {}", mesh.fragment.face_count());
    println!("Edges: {}", mesh.fragment.polyline_count());
    if let Some(texture) = &mesh.texture {
        println!("Texture: {}", texture.display());
    }
    let stats = cache.stats();
    println!("Cache: {} entries, {} hits, {} misses", cache.len(), stats.hits, stats.misses);
    print_diagnostics(&diagnostics);

    if let Some(path) = obj {
        write_obj(path, &mesh.name, &mesh.fragment)?;
    }
    Ok(())
}

fn run_model(session: &Session, file: &Path, options: &LoadOptions, obj: Option<&Path>) -> Result<()> {
    let model = Model::load(session, file, options)
        .with_context(|| format!("Failed to load model {}", file.display()))?;
    let scene = SceneBuilder::new(session)
        .build(&model)
        .with_context(|| format!("Failed to build scene for {}", file.display()))?;

    println!("Model: {}", scene.name);
    println!("Materialized parts: {}", model.materialized().len());
    println!("Prototypes: {}", scene.prototype_count());
    println!("Instances: {}", scene.instance_count());
    println!("Faces: {}", scene.total_face_count());
    let bounds = scene.world_bounds();
    if !bounds.is_empty() {
        println!(
            "Bounds: ({:.1}, {:.1}, {:.1}) to ({:.1}, {:.1}, {:.1})",
            bounds.min.x, bounds.min.y, bounds.min.z, bounds.max.x, bounds.max.y, bounds.max.z
        );
    }
    print_diagnostics(&scene.diagnostics);

    if let Some(path) = obj {
        write_obj(path, &scene.name, &scene.flatten())?;
    }
    Ok(())
}

fn run_split(session: &Session, file: &Path, force: bool) -> Result<()> {
    let content = fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let document = MpdDocument::split(&content);
    let written = document
        .materialize(session.layout(), force)
        .context("Failed to write unofficial parts")?;

    log::info!("Split {} into {} segments", file.display(), document.len());
    println!("Segments: {}", document.len());
    for path in &written {
        println!("  wrote {}", path.display());
    }
    println!("Wrote {} part(s)", written.len());
    Ok(())
}

fn convert_colors(input: &Path, overrides: Option<&Path>, output: &Path) -> Result<()> {
    let mut table =
        ColorTable::load_ldconfig(input).with_context(|| format!("Failed to parse {}", input.display()))?;
    if let Some(path) = overrides {
        let extra = ColorTable::load_json(path).with_context(|| format!("Failed to read {}", path.display()))?;
        log::info!("Merging {} color overrides from {}", extra.len(), path.display());
        table.merge(&extra);
    }

    fs::write(output, table.to_json_string()?).with_context(|| format!("Failed to write {}", output.display()))?;
    println!(
        "Wrote {} colors in {} categories to {}",
        table.len(),
        table.categories().len(),
        output.display()
    );
    Ok(())
}

fn print_diagnostics(diagnostics: &Diagnostics) {
    if diagnostics.is_empty() {
        return;
    }
    for diagnostic in diagnostics.iter() {
        log::debug!("{}", diagnostic);
    }
    println!(
        "Diagnostics: {} missing parts, {} missing colors, {} malformed lines",
        diagnostics.missing_parts(),
        diagnostics.missing_colors(),
        diagnostics.malformed_lines()
    );
}

/// Host-facing transform: LDraw is -Y up, so flip about X and scale down.
fn presentation_transform() -> Mat4 {
    Mat4::from_scale(Vec3::splat(PRESENTATION_SCALE)) * Mat4::from_rotation_x(std::f32::consts::PI)
}

fn write_obj(path: &Path, name: &str, fragment: &GeometryFragment) -> Result<()> {
    let mut fragment = fragment.clone();
    fragment.transform(&presentation_transform());

    let mut out = String::new();
    writeln!(out, "# brix export")?;
    writeln!(out, "o {}", name)?;

    let mut next_index = 1usize;
    for polygon in fragment.iter() {
        let rgb = polygon.rgb;
        for p in &polygon.positions {
            writeln!(out, "v {:.6} {:.6} {:.6} {:.4} {:.4} {:.4}", p.x, p.y, p.z, rgb.x, rgb.y, rgb.z)?;
        }
        let indices: Vec<String> = (next_index..next_index + polygon.positions.len())
            .map(|i| i.to_string())
            .collect();
        let keyword = match polygon.kind {
            PolygonKind::Face => "f",
            PolygonKind::Polyline => "l",
        };
        writeln!(out, "{} {}", keyword, indices.join(" "))?;
        next_index += polygon.positions.len();
    }

    fs::write(path, out).with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("Wrote {} vertices for '{}'", next_index - 1, name);
    println!("Exported OBJ to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use brix_core::{ColorSource, Polygon, Provenance, ResolvedColor};

    fn red() -> ResolvedColor {
        ResolvedColor {
            rgb: Vec3::new(0.5, 0.0, 0.0),
            is_static: true,
            code: 4,
            category: 0,
            source: ColorSource::Table,
        }
    }

    #[test]
    fn test_presentation_transform_flips_and_scales() {
        let p = presentation_transform().transform_point3(Vec3::new(0.0, -250.0, 100.0));
        assert!((p - Vec3::new(0.0, 1.0, -0.4)).length() < 1e-5);
    }

    #[test]
    fn test_write_obj() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("part.obj");

        let mut fragment = GeometryFragment::new();
        fragment.push(Polygon::face(
            vec![Vec3::ZERO, Vec3::new(250.0, 0.0, 0.0), Vec3::new(0.0, 250.0, 0.0)],
            &red(),
            Provenance::Base,
        ));
        fragment.push(Polygon::polyline(vec![Vec3::ZERO, Vec3::new(0.0, 0.0, 250.0)], 0));

        write_obj(&path, "3001", &fragment).unwrap();
        let obj = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = obj.lines().collect();

        assert_eq!(lines[1], "o 3001");
        let vertex: Vec<f32> = lines[3]
            .strip_prefix("v ")
            .unwrap()
            .split_whitespace()
            .map(|t| t.parse().unwrap())
            .collect();
        let expected = [1.0, 0.0, 0.0, 0.5, 0.0, 0.0];
        assert_eq!(vertex.len(), 6);
        assert!(vertex.iter().zip(expected).all(|(a, b)| (a - b).abs() < 1e-5));
        assert_eq!(lines[5], "f 1 2 3");
        assert_eq!(lines[8], "l 4 5");
    }

    #[test]
    fn test_cli_parses_part_options() {
        let args = ["brix", "--config", "lib.json", "part", "3001p01", "--print-mode", "separate", "--edges"];
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("lib.json")));
        match cli.command {
            Commands::Part {
                name,
                print_mode,
                edges,
                high_res,
                ..
            } => {
                assert_eq!(name, "3001p01");
                assert_eq!(PrintMode::from(print_mode), PrintMode::Separate);
                assert!(edges);
                assert!(!high_res);
            }
            _ => panic!("expected part command"),
        }
    }
}
