//! Example: Load an LDraw model and inspect the resulting scene.
//!
//! Run with: LDRAW_LIB=/path/to/ldraw cargo run --example load_model -- model.mpd

use std::env;

use brix_core::{LibraryConfig, LoadOptions, Model, SceneBuilder};

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Usage: load_model <path-to-model>");
        println!("\nThe library root is read from LDRAW_LIB.");
        println!("\nExamples:");
        println!("  cargo run --example load_model -- castle.mpd");
        println!("  cargo run --example load_model -- wall.ldr");
        return;
    }

    let session = match LibraryConfig::from_env().and_then(|config| config.open()) {
        Ok(session) => session,
        Err(e) => {
            eprintln!("Error opening library: {}", e);
            return;
        }
    };

    let path = &args[1];
    println!("Loading model: {}", path);

    let model = match Model::load(&session, path, &LoadOptions::default()) {
        Ok(model) => model,
        Err(e) => {
            eprintln!("Error loading model: {}", e);
            return;
        }
    };

    match SceneBuilder::new(&session).build(&model) {
        Ok(scene) => {
            println!("\n=== Scene: {} ===", scene.name);
            println!("Prototypes: {}", scene.prototype_count());
            println!("Instances: {}", scene.instance_count());
            println!("Total faces: {}", scene.total_face_count());

            println!("\n--- Prototypes ---");
            for proto in &scene.prototypes {
                println!(
                    "  [{}] {} - {} faces, {} edges",
                    proto.id,
                    proto.name,
                    proto.mesh.fragment.face_count(),
                    proto.mesh.fragment.polyline_count()
                );
                if let Some(description) = &proto.mesh.description {
                    println!("       {}", description);
                }
            }

            println!("\n--- Instances ---");
            for (i, instance) in scene.instances.iter().enumerate() {
                let pos = instance.transform.transform_point3(brix_math::Vec3::ZERO);
                println!(
                    "  [{}] Proto {} color {} at ({:.2}, {:.2}, {:.2})",
                    i, instance.prototype_id, instance.color.code, pos.x, pos.y, pos.z
                );
            }

            let world_bounds = scene.world_bounds();
            println!("\n--- World Bounds ---");
            println!(
                "  Min: ({:.2}, {:.2}, {:.2})",
                world_bounds.min.x, world_bounds.min.y, world_bounds.min.z
            );
            println!(
                "  Max: ({:.2}, {:.2}, {:.2})",
                world_bounds.max.x, world_bounds.max.y, world_bounds.max.z
            );

            if !scene.diagnostics.is_empty() {
                println!("\n--- Diagnostics ---");
                for diagnostic in scene.diagnostics.iter() {
                    println!("  {}", diagnostic);
                }
            }
        }
        Err(e) => {
            eprintln!("Error building scene: {}", e);
        }
    }
}
