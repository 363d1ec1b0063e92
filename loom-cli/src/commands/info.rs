//! Document summary without resolving any buffers

use std::path::Path;

use console::style;
use gltfloom::container::{self, GlbHeader, SourceKind};
use gltfloom::schema::parse_document;

pub fn execute(path: &Path) -> anyhow::Result<()> {
    let kind = SourceKind::from_path(path)?;
    let data = std::fs::read(path)?;

    println!("glTF Asset Information");
    println!("======================");
    println!("File:        {}", path.display());
    println!("Container:   {}", kind.as_str());
    println!("File size:   {} bytes", data.len());
    if kind == SourceKind::Binary {
        let header = GlbHeader::read(&data)?;
        println!("GLB version: {}", header.version);
    }

    let extracted = container::extract(&data, kind)?;
    if let Some(bin) = &extracted.bin {
        println!("BIN chunk:   {} bytes", bin.len());
    }

    let parsed = parse_document(&extracted.json)?;
    let doc = &parsed.document;
    println!("Version:     {}", doc.asset.version);
    if let Some(generator) = &doc.asset.generator {
        println!("Generator:   {generator}");
    }
    println!();

    println!("Contents:");
    println!("---------");
    println!("  Scenes:       {}", doc.scenes.len());
    println!("  Nodes:        {}", doc.nodes.len());
    println!(
        "  Meshes:       {} ({} primitives)",
        doc.meshes.len(),
        doc.primitive_count()
    );
    println!("  Materials:    {}", doc.materials.len());
    println!("  Textures:     {}", doc.textures.len());
    println!("  Images:       {}", doc.images.len());
    println!("  Accessors:    {}", doc.accessors.len());
    println!("  Buffer views: {}", doc.buffer_views.len());
    println!("  Buffers:      {}", doc.buffers.len());
    println!("  Skins:        {}", doc.skins.len());
    println!("  Animations:   {}", doc.animations.len());
    println!("  Cameras:      {}", doc.cameras.len());

    if !doc.extensions_used.is_empty() {
        println!();
        println!("Extensions used:");
        for name in &doc.extensions_used {
            let required = doc.extensions_required.contains(name);
            println!("  - {name}{}", if required { " (required)" } else { "" });
        }
    }

    for warning in &parsed.warnings {
        println!("{} {warning}", style("warning:").yellow().bold());
    }

    Ok(())
}
