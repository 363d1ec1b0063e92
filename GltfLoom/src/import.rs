//! Top-level import operation
//!
//! Drives one asset through the staged pipeline: extract, parse, resolve
//! buffer views, create textures, create materials, build scenes. Every
//! renderer object created along the way is tracked; if any stage fails the
//! objects are destroyed again before the error is returned.

use std::collections::{BTreeSet, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::RgbaImage;
use walkdir::WalkDir;

use crate::container::{self, SourceKind};
use crate::error::{Error, Result};
use crate::material::{self, MaterialParams};
use crate::renderer::{NodeHandle, Renderer, TextureHandle, TextureParams, TrackedRenderer};
use crate::resolver::{FetchPolicy, Resolver, ViewSlice, images};
use crate::scene::{BuildEvent, SceneBuilder};
use crate::scheduling::{CancelToken, LoadMode, Scheduler, Stage};
use crate::schema::{self, GltfDocument};
use crate::types::{ImportPhase, ImportProgress, ImportProgressCallback, ImportWarning};

// ============================================================================
// Options
// ============================================================================

/// Which scenes of the document to build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SceneSelection {
    /// Every scene, in document order.
    #[default]
    All,
    /// The document's default scene, or the first scene if none is declared.
    Default,
    /// One scene by index.
    Index(usize),
}

/// Options for a single import.
#[derive(Clone)]
pub struct ImportOptions {
    /// Suspend at I/O and stage boundaries, or run everything inline.
    pub load_mode: LoadMode,

    /// Activate the returned root node.
    /// Default: true
    pub set_active: bool,

    /// Scenes to build.
    pub scene: SceneSelection,

    /// Allow `http(s)` URIs. Never honoured in synchronous mode.
    /// Default: true
    pub allow_network: bool,

    /// Cooperative cancellation, checked at every stage boundary.
    pub cancel: CancelToken,

    /// Called as each phase progresses.
    pub progress: Option<ImportProgressCallback>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            load_mode: LoadMode::Asynchronous,
            set_active: true,
            scene: SceneSelection::All,
            allow_network: true,
            cancel: CancelToken::new(),
            progress: None,
        }
    }
}

impl std::fmt::Debug for ImportOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImportOptions")
            .field("load_mode", &self.load_mode)
            .field("set_active", &self.set_active)
            .field("scene", &self.scene)
            .field("allow_network", &self.allow_network)
            .field("cancel", &self.cancel)
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl ImportOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the load mode.
    #[must_use]
    pub fn with_load_mode(mut self, mode: LoadMode) -> Self {
        self.load_mode = mode;
        self
    }

    /// Run every stage inline on the calling thread.
    #[must_use]
    pub fn synchronous(self) -> Self {
        self.with_load_mode(LoadMode::Synchronous)
    }

    /// Set which scenes to build.
    #[must_use]
    pub fn with_scene(mut self, scene: SceneSelection) -> Self {
        self.scene = scene;
        self
    }

    /// Refuse network URIs.
    #[must_use]
    pub fn no_network(mut self) -> Self {
        self.allow_network = false;
        self
    }

    /// Leave the returned root inactive.
    #[must_use]
    pub fn no_activate(mut self) -> Self {
        self.set_active = false;
        self
    }

    /// Share a cancellation token with the caller.
    #[must_use]
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Set a progress callback.
    #[must_use]
    pub fn with_progress(mut self, progress: ImportProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    fn report(&self, progress: ImportProgress) {
        if let Some(callback) = &self.progress {
            callback(&progress);
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// The fully resolved asset graph handed back to the host.
#[derive(Debug)]
pub struct GltfObject {
    /// Asset name, taken from the source file stem.
    pub name: String,
    /// The file actually parsed (inside the extracted directory for zips).
    pub source: Option<PathBuf>,
    pub document: GltfDocument,
    pub load_mode: LoadMode,
}

/// Outcome of a successful import.
#[derive(Debug)]
pub struct ImportedAsset {
    /// Root node holding one child per built scene.
    pub root: NodeHandle,
    pub object: GltfObject,
    pub warnings: Vec<ImportWarning>,
    /// Node state transitions in the order they happened.
    pub trace: Vec<BuildEvent>,
    /// Renderer objects the import created.
    pub created_objects: usize,
}

// ============================================================================
// Entry points
// ============================================================================

/// Import a `.gltf`, `.glb` or `.zip`-wrapped asset from disk.
///
/// # Errors
/// Returns an error if the file cannot be read, is malformed, or references
/// data that cannot be resolved. No renderer objects survive a failure.
pub async fn import_gltf(
    path: impl AsRef<Path>,
    renderer: &mut dyn Renderer,
    options: &ImportOptions,
) -> Result<ImportedAsset> {
    let path = path.as_ref();
    tracing::info!("Importing {}", path.display());
    options.report(ImportProgress::with_item(
        ImportPhase::ReadingFile,
        0,
        1,
        path.display().to_string(),
    ));

    let scheduler = Scheduler::new(options.load_mode, options.cancel.clone());
    let source = if has_extension(path, "zip") {
        let archive = path.to_path_buf();
        scheduler.background(move || unpack_archive(&archive)).await?
    } else {
        path.to_path_buf()
    };

    let kind = SourceKind::from_path(&source)?;
    let data = match options.load_mode {
        LoadMode::Synchronous => std::fs::read(&source)?,
        LoadMode::Asynchronous => tokio::fs::read(&source).await?,
    };
    options.report(ImportProgress::new(ImportPhase::ReadingFile, 1, 1));

    let name = source
        .file_stem()
        .map_or_else(|| "glTF".to_string(), |s| s.to_string_lossy().into_owned());
    let base_dir = source.parent().map(Path::to_path_buf);

    let mut asset = import_source(data, kind, name, base_dir, renderer, options).await?;
    asset.object.source = Some(source);
    Ok(asset)
}

/// Import an asset already held in memory.
///
/// Relative URIs resolve against `base_dir`; without one only embedded and
/// data-URI resources are available.
///
/// # Errors
/// See [`import_gltf`].
pub async fn import_gltf_bytes(
    data: Vec<u8>,
    kind: SourceKind,
    name: impl Into<String>,
    base_dir: Option<PathBuf>,
    renderer: &mut dyn Renderer,
    options: &ImportOptions,
) -> Result<ImportedAsset> {
    let name = name.into();
    tracing::info!("Importing {name} ({} bytes, {})", data.len(), kind.as_str());
    import_source(data, kind, name, base_dir, renderer, options).await
}

/// Import from disk without an outer async runtime.
///
/// Forces [`LoadMode::Synchronous`]: every stage runs on the calling thread
/// and network URIs are refused.
///
/// # Errors
/// See [`import_gltf`].
pub fn import_gltf_blocking(
    path: impl AsRef<Path>,
    renderer: &mut dyn Renderer,
    options: &ImportOptions,
) -> Result<ImportedAsset> {
    let options = options.clone().synchronous();
    let runtime = tokio::runtime::Builder::new_current_thread().build()?;
    runtime.block_on(import_gltf(path, renderer, &options))
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Extract `archive` next to itself and return the first glTF file inside.
///
/// Extraction is skipped when the target directory already exists. Only the
/// top level of the directory is searched.
fn unpack_archive(archive: &Path) -> Result<PathBuf> {
    let dir = archive.with_extension("");

    if dir.exists() {
        tracing::debug!("Reusing extracted archive at {}", dir.display());
    } else {
        tracing::info!("Extracting {} to {}", archive.display(), dir.display());
        let failed = |message: String| Error::ArchiveExtractionFailed {
            path: archive.to_path_buf(),
            message,
        };
        let file = File::open(archive)?;
        let mut zip = zip::ZipArchive::new(file).map_err(|e| failed(e.to_string()))?;
        zip.extract(&dir).map_err(|e| failed(e.to_string()))?;
    }

    for entry in WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type().is_file() && (has_extension(path, "gltf") || has_extension(path, "glb"))
        {
            return Ok(path.to_path_buf());
        }
    }
    Err(Error::NoGltfInArchive(dir))
}

// ============================================================================
// Construction
// ============================================================================

struct Constructed {
    root: NodeHandle,
    document: GltfDocument,
    warnings: Vec<ImportWarning>,
    trace: Vec<BuildEvent>,
}

async fn import_source(
    data: Vec<u8>,
    kind: SourceKind,
    name: String,
    base_dir: Option<PathBuf>,
    renderer: &mut dyn Renderer,
    options: &ImportOptions,
) -> Result<ImportedAsset> {
    let data: Arc<[u8]> = Arc::from(data);
    let mut restarted = false;

    loop {
        let mut tracked = TrackedRenderer::new(&mut *renderer);
        let result = construct(&data, kind, &name, base_dir.as_ref(), &mut tracked, options).await;

        match result {
            Ok(constructed) => {
                let created_objects = tracked.created();
                tracing::info!(
                    "Imported {name}: {} nodes, {} meshes, {} materials, {} renderer objects",
                    constructed.document.nodes.len(),
                    constructed.document.meshes.len(),
                    constructed.document.materials.len(),
                    created_objects
                );
                options.report(ImportProgress::new(ImportPhase::Complete, 1, 1));
                return Ok(ImportedAsset {
                    root: constructed.root,
                    object: GltfObject {
                        name,
                        source: None,
                        document: constructed.document,
                        load_mode: options.load_mode,
                    },
                    warnings: constructed.warnings,
                    trace: constructed.trace,
                    created_objects,
                });
            }
            Err(err) => {
                tracked.rollback();
                match err {
                    Error::ReprocessRequired(path) if !restarted => {
                        tracing::info!(
                            "Texture {} reprocessed, restarting construction",
                            path.display()
                        );
                        restarted = true;
                    }
                    Error::ReprocessRequired(path) => return Err(Error::TextureNotReadable(path)),
                    err => {
                        tracing::debug!("Import of {name} failed: {err}");
                        return Err(err);
                    }
                }
            }
        }
    }
}

/// One construction pass over a freshly parsed graph.
async fn construct(
    data: &Arc<[u8]>,
    kind: SourceKind,
    name: &str,
    base_dir: Option<&PathBuf>,
    renderer: &mut dyn Renderer,
    options: &ImportOptions,
) -> Result<Constructed> {
    let mut scheduler = Scheduler::new(options.load_mode, options.cancel.clone());

    scheduler.enter(Stage::Extract).await?;
    let bytes = Arc::clone(data);
    let extracted = scheduler
        .background(move || container::extract(&bytes, kind))
        .await?;

    scheduler.enter(Stage::Parse).await?;
    options.report(ImportProgress::new(ImportPhase::Parsing, 0, 1));
    let json = extracted.json;
    let parsed = scheduler
        .background(move || schema::parse_document(&json))
        .await?;
    let mut document = parsed.document;
    let mut warnings = parsed.warnings;
    options.report(ImportProgress::new(ImportPhase::Parsing, 1, 1));

    scheduler.enter(Stage::BufferViews).await?;
    options.report(ImportProgress::new(
        ImportPhase::Buffers,
        0,
        document.buffer_views.len(),
    ));
    let policy = FetchPolicy {
        base_dir: base_dir.cloned(),
        mode: options.load_mode,
        allow_network: options.allow_network,
    };
    let resolver = Resolver::new(policy, extracted.bin);
    let views = resolver.views(&document).await?;
    options.report(ImportProgress::new(
        ImportPhase::Buffers,
        views.len(),
        views.len(),
    ));

    scheduler.enter(Stage::Textures).await?;
    create_textures(
        &mut document,
        &views,
        &resolver,
        &scheduler,
        renderer,
        &mut warnings,
        options,
    )
    .await?;

    scheduler.enter(Stage::Materials).await?;
    create_materials(&mut document, renderer, options)?;

    scheduler.enter(Stage::Scenes).await?;
    let scenes = select_scenes(&document, options.scene, &mut warnings)?;
    let root = renderer.create_node(name)?;

    let mut builder = SceneBuilder::new(
        &document,
        &views,
        &scheduler,
        &mut *renderer,
        options.progress.as_ref(),
    );
    builder.build_scenes(&scenes, root).await?;
    let (meshes, trace) = builder.finish();

    for (index, constructed) in meshes {
        document.meshes[index].constructed = Some(constructed);
    }

    if options.set_active {
        renderer.set_active(root, true)?;
    }

    Ok(Constructed {
        root,
        document,
        warnings,
        trace,
    })
}

fn select_scenes(
    doc: &GltfDocument,
    selection: SceneSelection,
    warnings: &mut Vec<ImportWarning>,
) -> Result<Vec<usize>> {
    if let SceneSelection::Index(index) = selection {
        if index >= doc.scenes.len() {
            return Err(Error::missing("import options", "scene", index));
        }
        return Ok(vec![index]);
    }

    if doc.scenes.is_empty() {
        tracing::warn!("Document has no scenes, returning an empty root");
        warnings.push(ImportWarning::NoScenes);
        return Ok(Vec::new());
    }

    match selection {
        SceneSelection::Default => match doc.scene {
            Some(index) => Ok(vec![index]),
            None => {
                tracing::warn!("No default scene declared, using scene 0");
                warnings.push(ImportWarning::NoDefaultScene);
                Ok(vec![0])
            }
        },
        _ => Ok((0..doc.scenes.len()).collect()),
    }
}

/// Textures sampled as data rather than colour.
fn linear_textures(doc: &GltfDocument) -> BTreeSet<usize> {
    let mut linear = BTreeSet::new();
    for material in &doc.materials {
        linear.extend(material.normal_texture.as_ref().map(|t| t.index));
        linear.extend(material.occlusion_texture.as_ref().map(|t| t.index));
        linear.extend(
            material
                .pbr_metallic_roughness
                .metallic_roughness_texture
                .as_ref()
                .map(|t| t.index),
        );
    }
    linear
}

async fn create_textures(
    doc: &mut GltfDocument,
    views: &[ViewSlice],
    resolver: &Resolver,
    scheduler: &Scheduler,
    renderer: &mut dyn Renderer,
    warnings: &mut Vec<ImportWarning>,
    options: &ImportOptions,
) -> Result<()> {
    let total = doc.textures.len();
    let linear = linear_textures(doc);
    let metallic_roughness: BTreeSet<usize> =
        material::metallic_roughness_textures(doc).into_iter().collect();

    let mut decoded: HashMap<usize, Arc<RgbaImage>> = HashMap::new();
    let mut handles: Vec<(Option<TextureHandle>, Option<TextureHandle>)> =
        Vec::with_capacity(total);

    for (index, texture) in doc.textures.iter().enumerate() {
        scheduler.checkpoint()?;
        options.report(ImportProgress::new(ImportPhase::Textures, index + 1, total));

        let Some(source) = texture.source else {
            tracing::warn!("Texture {index} has no image source, skipping");
            warnings.push(ImportWarning::TextureWithoutSource(index));
            handles.push((None, None));
            continue;
        };
        let image = doc
            .images
            .get(source)
            .ok_or_else(|| Error::missing(format!("texture {index}"), "image", source))?;

        let host = images::local_path(image, resolver)
            .and_then(|path| renderer.host_texture(&path).map(|host| (path, host)));
        if let Some((path, host)) = &host {
            if !host.readable {
                tracing::info!("Host texture {} is not readable, reprocessing", path.display());
                renderer.make_readable(path)?;
                return Err(Error::ReprocessRequired(path.clone()));
            }
        }

        let name = texture.name.clone().or_else(|| image.name.clone());
        let sampler = texture
            .sampler
            .and_then(|s| doc.samplers.get(s))
            .cloned()
            .unwrap_or_default();
        let needs_remap = metallic_roughness.contains(&index);

        let (plain, pixels) = match &host {
            Some((_, host)) if !needs_remap => (host.handle, None),
            Some((_, host)) => {
                let pixels =
                    decode_image(doc, views, resolver, scheduler, &mut decoded, source).await?;
                (host.handle, Some(pixels))
            }
            None => {
                let pixels =
                    decode_image(doc, views, resolver, scheduler, &mut decoded, source).await?;
                let handle = renderer.create_texture(&TextureParams {
                    name: name.clone(),
                    image: Arc::clone(&pixels),
                    sampler: sampler.clone(),
                    linear: linear.contains(&index),
                })?;
                (handle, Some(pixels))
            }
        };

        let remapped = match pixels.filter(|_| needs_remap) {
            Some(pixels) => {
                let remapped = scheduler
                    .background(move || Ok(material::remap_metallic_roughness(&pixels)))
                    .await?;
                Some(renderer.create_texture(&TextureParams {
                    name: name.map(|n| format!("{n} (metallic/smoothness)")),
                    image: Arc::new(remapped),
                    sampler,
                    linear: true,
                })?)
            }
            None => None,
        };

        handles.push((Some(plain), remapped));
    }

    for (texture, (handle, metallic_gloss)) in doc.textures.iter_mut().zip(handles) {
        texture.handle = handle;
        texture.metallic_gloss_handle = metallic_gloss;
    }
    tracing::debug!("Created {total} textures ({} decoded images)", decoded.len());
    Ok(())
}

/// Decoded pixels of image `source`, decoding at most once per image.
async fn decode_image(
    doc: &GltfDocument,
    views: &[ViewSlice],
    resolver: &Resolver,
    scheduler: &Scheduler,
    cache: &mut HashMap<usize, Arc<RgbaImage>>,
    source: usize,
) -> Result<Arc<RgbaImage>> {
    if let Some(pixels) = cache.get(&source) {
        return Ok(Arc::clone(pixels));
    }
    let encoded = images::load(doc, views, resolver, source).await?;
    let pixels = Arc::new(scheduler.background(move || encoded.decode()).await?);
    cache.insert(source, Arc::clone(&pixels));
    Ok(pixels)
}

fn create_materials(
    doc: &mut GltfDocument,
    renderer: &mut dyn Renderer,
    options: &ImportOptions,
) -> Result<()> {
    let total = doc.materials.len();
    let mut handles = Vec::with_capacity(total);
    for (index, material) in doc.materials.iter().enumerate() {
        let params = MaterialParams::from_material(doc, index, material);
        options.report(ImportProgress::with_item(
            ImportPhase::Materials,
            index + 1,
            total,
            &params.name,
        ));
        handles.push(renderer.create_material(&params)?);
    }
    for (material, handle) in doc.materials.iter_mut().zip(handles) {
        material.handle = Some(handle);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(json: &str) -> GltfDocument {
        schema::parse_document(json).unwrap().document
    }

    #[test]
    fn test_scene_selection() {
        let two = doc(r#"{"asset":{"version":"2.0"},"scenes":[{},{}],"scene":1}"#);
        let mut warnings = Vec::new();
        assert_eq!(select_scenes(&two, SceneSelection::All, &mut warnings).unwrap(), vec![0, 1]);
        assert_eq!(select_scenes(&two, SceneSelection::Default, &mut warnings).unwrap(), vec![1]);
        assert!(warnings.is_empty());
        assert!(select_scenes(&two, SceneSelection::Index(2), &mut warnings).is_err());

        let empty = doc(r#"{"asset":{"version":"2.0"}}"#);
        assert!(select_scenes(&empty, SceneSelection::Default, &mut warnings).unwrap().is_empty());
        assert_eq!(warnings, vec![ImportWarning::NoScenes]);
    }

    #[test]
    fn test_default_scene_falls_back_to_first() {
        let one = doc(r#"{"asset":{"version":"2.0"},"scenes":[{}]}"#);
        let mut warnings = Vec::new();
        assert_eq!(select_scenes(&one, SceneSelection::Default, &mut warnings).unwrap(), vec![0]);
        assert_eq!(warnings, vec![ImportWarning::NoDefaultScene]);
    }

    #[test]
    fn test_options_builder() {
        let options = ImportOptions::new().synchronous().no_network().no_activate();
        assert_eq!(options.load_mode, LoadMode::Synchronous);
        assert!(!options.allow_network);
        assert!(!options.set_active);
        assert_eq!(options.scene, SceneSelection::All);
    }
}
