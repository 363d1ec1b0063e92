use clap::Subcommand;
use std::path::PathBuf;

pub mod info;
pub mod inspect;
pub mod pack;

#[derive(Subcommand)]
pub enum Commands {
    /// Parse a .gltf/.glb file and summarize its contents
    Info {
        /// Source file
        path: PathBuf,
    },

    /// Import an asset into a headless renderer and print the scene graph
    Inspect {
        /// Source .gltf, .glb or .zip file
        path: PathBuf,

        /// Load synchronously (local resources only)
        #[arg(long)]
        sync: bool,

        /// Build only this scene
        #[arg(long)]
        scene: Option<usize>,
    },

    /// Embed every buffer of a .gltf file into a single .glb
    Pack {
        /// Source .gltf file
        input: PathBuf,

        /// Output .glb file
        output: PathBuf,
    },
}

impl Commands {
    pub fn execute(&self) -> anyhow::Result<()> {
        match self {
            Commands::Info { path } => info::execute(path),
            Commands::Inspect { path, sync, scene } => inspect::execute(path, *sync, *scene),
            Commands::Pack { input, output } => pack::execute(input, output),
        }
    }
}
