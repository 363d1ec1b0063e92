//! Scene graph construction
//!
//! Walks each selected scene's root list depth-first and instantiates one
//! renderer node per glTF node. Every node moves through the same states:
//!
//! 1. `Created` - node exists, hidden and unparented
//! 2. `PoseApplied` - local transform set
//! 3. `MeshAttached` - geometry and material slots bound (nodes with a mesh)
//! 4. `ChildrenAttached` - every child subtree is complete
//! 5. `Visible` - parented under its parent and activated
//!
//! A node is only parented and shown once its whole subtree is built, so a
//! partially constructed hierarchy is never visible.
//!
//! A single scene's root nodes hang directly off the import root. When
//! several scenes are built, each gets its own container node.

use std::collections::{HashMap, HashSet};

use rayon::prelude::*;

use crate::assembler::{self, PrimitiveInputs};
use crate::error::{Error, Result};
use crate::renderer::{NodeHandle, Renderer, Transform};
use crate::resolver::ViewSlice;
use crate::schema::{ConstructedMesh, GltfDocument};
use crate::scheduling::Scheduler;
use crate::types::{ImportPhase, ImportProgress, ImportProgressCallback};

/// Construction state of a single node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NodeState {
    Created,
    PoseApplied,
    MeshAttached,
    ChildrenAttached,
    Visible,
}

/// One state transition, in the order it happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildEvent {
    /// Index into the document's `nodes` array.
    pub node: usize,
    pub handle: NodeHandle,
    pub state: NodeState,
}

/// Nodes seen while walking one scene.
#[derive(Default)]
struct Walk {
    ancestors: Vec<usize>,
    visited: HashSet<usize>,
}

/// Builds scene hierarchies for one document.
pub(crate) struct SceneBuilder<'a> {
    doc: &'a GltfDocument,
    views: &'a [ViewSlice],
    scheduler: &'a Scheduler,
    renderer: &'a mut dyn Renderer,
    progress: Option<&'a ImportProgressCallback>,
    meshes: HashMap<usize, ConstructedMesh>,
    trace: Vec<BuildEvent>,
}

impl<'a> SceneBuilder<'a> {
    pub(crate) fn new(
        doc: &'a GltfDocument,
        views: &'a [ViewSlice],
        scheduler: &'a Scheduler,
        renderer: &'a mut dyn Renderer,
        progress: Option<&'a ImportProgressCallback>,
    ) -> Self {
        Self {
            doc,
            views,
            scheduler,
            renderer,
            progress,
            meshes: HashMap::new(),
            trace: Vec::new(),
        }
    }

    /// Build the given scenes under `root`, in order.
    pub(crate) async fn build_scenes(&mut self, scenes: &[usize], root: NodeHandle) -> Result<()> {
        let containers = scenes.len() > 1;
        for (i, &index) in scenes.iter().enumerate() {
            let scene = self
                .doc
                .scenes
                .get(index)
                .ok_or_else(|| Error::missing("import", "scene", index))?;
            let name = scene
                .name
                .clone()
                .unwrap_or_else(|| format!("Scene {index}"));

            if let Some(progress) = self.progress {
                progress(&ImportProgress::with_item(ImportPhase::Scenes, i + 1, scenes.len(), &name));
            }
            tracing::debug!("Building scene {index} ({} root nodes)", scene.nodes.len());

            let parent = if containers {
                self.renderer.create_node(&name)?
            } else {
                root
            };
            let mut walk = Walk::default();
            for &node in &scene.nodes {
                self.scheduler.checkpoint()?;
                self.build_node(node, parent, &mut walk).await?;
            }
            if containers {
                self.renderer.set_parent(parent, root)?;
                self.renderer.set_active(parent, true)?;
            }
        }
        Ok(())
    }

    fn record(&mut self, node: usize, handle: NodeHandle, state: NodeState) {
        self.trace.push(BuildEvent { node, handle, state });
    }

    async fn build_node(
        &mut self,
        index: usize,
        parent: NodeHandle,
        walk: &mut Walk,
    ) -> Result<NodeHandle> {
        if walk.ancestors.contains(&index) {
            return Err(Error::CyclicNodeGraph(index));
        }
        if !walk.visited.insert(index) {
            return Err(Error::SharedNode(index));
        }
        let doc = self.doc;
        let node = doc
            .nodes
            .get(index)
            .ok_or_else(|| Error::missing("scene", "node", index))?;

        let name = node.name.clone().unwrap_or_else(|| format!("Node {index}"));
        let handle = self.renderer.create_node(&name)?;
        self.record(index, handle, NodeState::Created);

        let (translation, rotation, scale) = node.local_trs();
        let transform = Transform {
            translation,
            rotation,
            scale,
        };
        self.renderer.set_local_transform(handle, &transform)?;
        self.record(index, handle, NodeState::PoseApplied);

        if let Some(mesh) = node.mesh {
            let constructed = self.mesh(mesh).await?;
            self.renderer
                .attach_mesh(handle, constructed.mesh, &constructed.materials)?;
            self.record(index, handle, NodeState::MeshAttached);
        }

        walk.ancestors.push(index);
        for &child in &node.children {
            Box::pin(self.build_node(child, handle, walk)).await?;
        }
        walk.ancestors.pop();
        self.record(index, handle, NodeState::ChildrenAttached);

        self.renderer.set_parent(handle, parent)?;
        self.renderer.set_active(handle, true)?;
        self.record(index, handle, NodeState::Visible);

        Ok(handle)
    }

    /// The renderer mesh for mesh `index`, assembling it on first use.
    async fn mesh(&mut self, index: usize) -> Result<ConstructedMesh> {
        if let Some(constructed) = self.meshes.get(&index) {
            return Ok(constructed.clone());
        }

        let doc = self.doc;
        let mesh = doc
            .meshes
            .get(index)
            .ok_or_else(|| Error::missing("node", "mesh", index))?;

        let inputs = (0..mesh.primitives.len())
            .map(|primitive| PrimitiveInputs::bind(doc, self.views, index, primitive))
            .collect::<Result<Vec<_>>>()?;

        let name = mesh.name.clone();
        let geometry = self
            .scheduler
            .background(move || {
                let primitives = inputs
                    .into_par_iter()
                    .map(PrimitiveInputs::assemble)
                    .collect::<Result<Vec<_>>>()?;
                Ok(assembler::combine(name, primitives))
            })
            .await?;

        tracing::debug!(
            "Assembled mesh {index}: {} vertices, {} submeshes",
            geometry.vertex_count(),
            geometry.submeshes.len()
        );

        let handle = self.renderer.create_mesh(&geometry)?;
        let materials = geometry
            .material_slots()
            .into_iter()
            .map(|slot| slot.and_then(|m| doc.materials.get(m)).and_then(|m| m.handle))
            .collect();

        let constructed = ConstructedMesh {
            mesh: handle,
            materials,
        };
        self.meshes.insert(index, constructed.clone());
        Ok(constructed)
    }

    /// Constructed meshes and the build trace.
    pub(crate) fn finish(self) -> (HashMap<usize, ConstructedMesh>, Vec<BuildEvent>) {
        (self.meshes, self.trace)
    }
}
