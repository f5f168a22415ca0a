use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;

use character_rig::config::{init_logging, RigConfig};
use character_rig::core::{Progress, RigResult};
use character_rig::rig::{load_rig, RigDefinition, StaticMesh};

#[derive(Parser, Debug)]
#[command(name = "character_rig", version, about = "Build a rig and print its bone table")]
struct Cli {
    /// JSON rig definition
    rig: PathBuf,

    /// TOML configuration file (defaults are used when omitted)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            process::exit(1);
        }
    };
    init_logging(&config.logging);

    if let Err(e) = run(&cli.rig) {
        eprintln!("Failed to load rig {}: {}", cli.rig.display(), e);
        process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> RigResult<RigConfig> {
    let mut config = match path {
        Some(path) => RigConfig::from_toml_file(path)?,
        None => RigConfig::default(),
    };
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

fn run(path: &Path) -> RigResult<()> {
    let definition = RigDefinition::from_json_file(path)?;

    // 只检查骨架结构，不需要网格数据
    let vertex_count = definition
        .weights
        .values()
        .flatten()
        .map(|&(vertex, _)| vertex + 1)
        .max()
        .unwrap_or(0);
    let mesh = StaticMesh::new(vec![glam::Vec3::ZERO; vertex_count]);

    let mut report =
        |value: f32| tracing::trace!(target: "rig", "build progress {:.0}%", value * 100.0);
    let mut progress = Progress::new(Some(&mut report), 0);
    let (skeleton, weights) = load_rig(&definition, &mesh, &mut progress)?;

    tracing::info!(
        target: "rig",
        "{:>4}  {:<24} {:<24} {:>8} {:>8}",
        "idx",
        "bone",
        "parent",
        "length",
        "roll"
    );
    for bone in skeleton.bones() {
        let parent = bone
            .parent()
            .and_then(|p| skeleton.bone_at(p))
            .map(|p| p.name())
            .unwrap_or("-");
        tracing::info!(
            target: "rig",
            "{:>4}  {:<24} {:<24} {:>8.4} {:>8.4}",
            bone.index(),
            bone.name(),
            parent,
            bone.length(),
            bone.roll()
        );
    }
    tracing::info!(
        target: "rig",
        "{} bones, {} roots, {} weighted bones",
        skeleton.bone_count(),
        skeleton.roots().len(),
        weights.len()
    );
    skeleton.display();
    Ok(())
}
