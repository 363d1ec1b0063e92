//! Full import into the headless renderer

use std::path::Path;
use std::time::Instant;

use console::style;
use gltfloom::prelude::*;

use crate::progress::{CUBE, LOOKING_GLASS, import_callback, print_done, print_step, simple_spinner};

pub fn execute(path: &Path, sync: bool, scene: Option<usize>) -> anyhow::Result<()> {
    let started = Instant::now();
    print_step(1, 2, LOOKING_GLASS, &format!("Importing {}...", path.display()));

    let pb = simple_spinner("Reading file");
    let mut options = ImportOptions::new().with_progress(import_callback(&pb));
    if let Some(index) = scene {
        options = options.with_scene(SceneSelection::Index(index));
    }

    tracing::debug!("Import options: {options:?}");

    let mut renderer = HeadlessRenderer::new();
    let result = if sync {
        import_gltf_blocking(path, &mut renderer, &options)
    } else {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        runtime.block_on(import_gltf(path, &mut renderer, &options))
    };
    pb.finish_and_clear();
    let asset = result?;

    print_step(2, 2, CUBE, "Scene graph:");
    for (depth, handle) in renderer.walk(asset.root) {
        let Some(node) = renderer.node(handle) else {
            continue;
        };
        let indent = "  ".repeat(depth + 1);
        let hidden = if node.active { "" } else { " (inactive)" };
        println!("{indent}{}{}", style(&node.name).bold(), style(hidden).dim());

        if let Some((mesh, slots)) = &node.mesh {
            if let Some(geometry) = renderer.mesh(*mesh) {
                println!(
                    "{indent}  mesh: {} vertices, {} submeshes, {:?} indices",
                    geometry.vertex_count(),
                    geometry.submeshes.len(),
                    geometry.index_format()
                );
            }
            for (i, slot) in slots.iter().enumerate() {
                let name = slot
                    .and_then(|m| renderer.material(m))
                    .map_or("<default>", |m| m.name.as_str());
                println!("{indent}  material[{i}]: {name}");
            }
        }
    }

    println!();
    println!(
        "{} renderer objects, {} warnings",
        asset.created_objects,
        asset.warnings.len()
    );
    for warning in &asset.warnings {
        println!("{} {warning}", style("warning:").yellow().bold());
    }

    print_done(started.elapsed());
    Ok(())
}
