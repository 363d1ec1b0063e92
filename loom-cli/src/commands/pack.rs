//! Pack a `.gltf` and its buffers into one `.glb`

use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use gltfloom::LoadMode;
use gltfloom::container::GlbWriter;
use gltfloom::resolver::{FetchPolicy, Resolver};
use gltfloom::schema::parse_document;
use serde_json::{Value, json};

use crate::progress::{DISK, LOOKING_GLASS, PACKAGE, print_done, print_step};

pub fn execute(input: &Path, output: &Path) -> anyhow::Result<()> {
    let started = Instant::now();

    print_step(1, 3, LOOKING_GLASS, &format!("Reading {}...", input.display()));
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("failed to read {}", input.display()))?;
    let doc = parse_document(&text)?.document;
    let mut json: Value = serde_json::from_str(&text)?;

    print_step(2, 3, PACKAGE, &format!("Embedding {} buffers...", doc.buffers.len()));
    let policy = FetchPolicy {
        base_dir: input.parent().map(Path::to_path_buf),
        mode: LoadMode::Synchronous,
        allow_network: false,
    };
    let resolver = Resolver::new(policy, None);
    let runtime = tokio::runtime::Builder::new_current_thread().build()?;

    let mut bin = Vec::new();
    let mut offsets = Vec::with_capacity(doc.buffers.len());
    for index in 0..doc.buffers.len() {
        while bin.len() % 4 != 0 {
            bin.push(0);
        }
        offsets.push(bin.len());
        let payload = runtime.block_on(resolver.buffer(&doc, index))?;
        bin.extend_from_slice(&payload);
    }

    if let Some(views) = json.get_mut("bufferViews").and_then(Value::as_array_mut) {
        for view in views {
            let buffer = view["buffer"].as_u64().unwrap_or(0) as usize;
            let offset = view["byteOffset"].as_u64().unwrap_or(0) as usize;
            let base = offsets.get(buffer).copied().unwrap_or(0);
            view["buffer"] = json!(0);
            view["byteOffset"] = json!(base + offset);
        }
    }

    let writer = if bin.is_empty() {
        if let Some(object) = json.as_object_mut() {
            object.remove("buffers");
        }
        GlbWriter::new(json.to_string())
    } else {
        json["buffers"] = json!([{ "byteLength": bin.len() }]);
        GlbWriter::new(json.to_string()).with_bin(bin)
    };

    print_step(3, 3, DISK, &format!("Writing {}...", output.display()));
    let glb = writer.build();
    std::fs::write(output, &glb)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!("Wrote {} bytes", glb.len());
    print_done(started.elapsed());
    Ok(())
}
