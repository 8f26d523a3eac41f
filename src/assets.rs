/*
 * Asset Loading Module
 *
 * This module fetches everything the simulation consumes from disk: the
 * base bird mesh with its morph-target animation clip, and the three WGSL
 * kernel sources (velocity update, position update, render). The result is
 * a fully populated LoadedAssets value; nothing GPU-side runs before it
 * exists, and any missing piece aborts the load with a typed error.
 */

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::ANIMATION_FPS;

pub const MESH_FILE: &str = "boid.glb";
pub const SHADER_DIR: &str = "shaders";

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("could not locate the assets directory: {0}")]
    AssetsDir(String),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse mesh asset: {0}")]
    Mesh(#[from] gltf::Error),
    #[error("mesh asset contains no geometry")]
    MissingGeometry,
    #[error("mesh asset has no index buffer")]
    MissingIndices,
    #[error("mesh asset has no morph-target animation")]
    MissingAnimation,
    #[error("animation clip has zero duration")]
    EmptyClip,
}

// Base mesh attributes, exactly as stored in the asset
pub struct BaseMesh {
    pub positions: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl BaseMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

// Morph-target animation clip: one displacement set per keyframe, with the
// clip length expressed in simulation frames
pub struct AnimationClip {
    pub keyframes: Vec<Vec<[f32; 3]>>,
    pub duration_frames: u32,
}

// The three externally supplied kernel programs, passed to the compute and
// render pipelines verbatim
pub struct KernelSources {
    pub velocity: String,
    pub position: String,
    pub render: String,
}

pub struct LoadedAssets {
    pub mesh: BaseMesh,
    pub clip: AnimationClip,
    pub kernels: KernelSources,
}

// Load every asset the simulation needs from the given assets directory
pub fn load(assets_dir: &Path) -> Result<LoadedAssets, AssetError> {
    let (mesh, clip) = load_bird_asset(&assets_dir.join(MESH_FILE))?;
    let kernels = load_kernel_sources(&assets_dir.join(SHADER_DIR))?;

    log::info!(
        "loaded bird asset: {} vertices, {} indices, {} keyframes, {} animation frames",
        mesh.vertex_count(),
        mesh.indices.len(),
        clip.keyframes.len(),
        clip.duration_frames
    );

    Ok(LoadedAssets { mesh, clip, kernels })
}

// Parse the glTF asset into the base mesh and its morph-target clip
fn load_bird_asset(path: &Path) -> Result<(BaseMesh, AnimationClip), AssetError> {
    let (document, buffers, _images) = gltf::import(path)?;

    let mesh = document.meshes().next().ok_or(AssetError::MissingGeometry)?;
    let primitive = mesh.primitives().next().ok_or(AssetError::MissingGeometry)?;
    let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .ok_or(AssetError::MissingGeometry)?
        .collect();
    if positions.is_empty() {
        return Err(AssetError::MissingGeometry);
    }

    // Vertex colors are optional in the asset; fall back to black
    let colors: Vec<[f32; 3]> = reader
        .read_colors(0)
        .map(|colors| colors.into_rgb_f32().collect())
        .unwrap_or_else(|| vec![[0.0; 3]; positions.len()]);

    // Unindexed meshes cannot be tiled into instance geometry
    let indices: Vec<u32> = reader
        .read_indices()
        .ok_or(AssetError::MissingIndices)?
        .into_u32()
        .collect();

    // Each morph target is one keyframe pose. A target without position
    // displacements contributes an empty set; the baker treats those
    // vertices as absent rather than failing.
    let keyframes: Vec<Vec<[f32; 3]>> = reader
        .read_morph_targets()
        .map(|(displacements, _normals, _tangents)| {
            displacements
                .map(|iter| iter.collect())
                .unwrap_or_default()
        })
        .collect();
    if keyframes.is_empty() {
        return Err(AssetError::MissingAnimation);
    }

    // Clip length comes from the sampler inputs of the first animation
    let animation = document
        .animations()
        .next()
        .ok_or(AssetError::MissingAnimation)?;
    let mut duration_secs = 0.0f32;
    for channel in animation.channels() {
        let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
        if let Some(inputs) = reader.read_inputs() {
            for t in inputs {
                duration_secs = duration_secs.max(t);
            }
        }
    }

    let duration_frames = (duration_secs * ANIMATION_FPS).round() as u32;
    if duration_frames == 0 {
        return Err(AssetError::EmptyClip);
    }

    Ok((
        BaseMesh {
            positions,
            colors,
            indices,
        },
        AnimationClip {
            keyframes,
            duration_frames,
        },
    ))
}

// Fetch the three kernel programs as text
fn load_kernel_sources(dir: &Path) -> Result<KernelSources, AssetError> {
    Ok(KernelSources {
        velocity: read_source(&dir.join("velocity.wgsl"))?,
        position: read_source(&dir.join("position.wgsl"))?,
        render: read_source(&dir.join("bird.wgsl"))?,
    })
}

fn read_source(path: &Path) -> Result<String, AssetError> {
    fs::read_to_string(path).map_err(|source| AssetError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_shader_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gpu-flock-test-{name}-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn kernel_sources_load_verbatim() {
        let dir = temp_shader_dir("kernels");
        fs::write(dir.join("velocity.wgsl"), "// velocity kernel\n").unwrap();
        fs::write(dir.join("position.wgsl"), "// position kernel\n").unwrap();
        fs::write(dir.join("bird.wgsl"), "// render kernel\n").unwrap();

        let sources = load_kernel_sources(&dir).unwrap();
        assert_eq!(sources.velocity, "// velocity kernel\n");
        assert_eq!(sources.position, "// position kernel\n");
        assert_eq!(sources.render, "// render kernel\n");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_kernel_source_fails_with_path() {
        let dir = temp_shader_dir("missing");
        fs::write(dir.join("velocity.wgsl"), "").unwrap();
        fs::write(dir.join("position.wgsl"), "").unwrap();
        // bird.wgsl deliberately absent

        let err = load_kernel_sources(&dir).unwrap_err();
        match err {
            AssetError::Io { path, .. } => {
                assert!(path.ends_with("bird.wgsl"));
            }
            other => panic!("expected Io error, got {other:?}"),
        }

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn missing_mesh_asset_is_a_parse_error() {
        let path = std::env::temp_dir().join("gpu-flock-no-such-asset.glb");
        let err = load_bird_asset(&path).unwrap_err();
        assert!(matches!(err, AssetError::Mesh(_)));
    }
}
