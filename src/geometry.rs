/*
 * Instance Geometry Builder Module
 *
 * This module tiles the base bird mesh once per agent and attaches the
 * per-vertex addressing attributes the render kernel needs: which texel of
 * the simulation grid holds this vertex's agent, which animation-texture
 * column holds its baked displacement, and a stable per-agent random seed.
 * The merged buffers are uploaded once; visibility changes only move the
 * drawn index range.
 */

use rand::Rng;

use crate::assets::{AssetError, BaseMesh};
use crate::baker::AnimationTexture;

// Merged per-instance vertex data for the whole flock
pub struct InstanceGeometry {
    pub positions: Vec<[f32; 3]>,
    pub colors: Vec<[f32; 3]>,
    pub references: Vec<[f32; 4]>,
    pub seeds: Vec<[f32; 4]>,
    pub indices: Vec<u32>,
    pub indices_per_agent: u32,
}

impl InstanceGeometry {
    pub fn total_indices(&self) -> u32 {
        self.indices.len() as u32
    }
}

// Map an agent index to its 2D coordinate in the simulation grid. The
// mapping is a bijection onto [0, grid_width)^2 for grid_width^2 agents.
pub fn agent_grid_coord(index: u32, grid_width: u32) -> (u32, u32) {
    (index % grid_width, index / grid_width)
}

// Tile the base mesh `agent_count` times and derive the addressing
// attributes. Fails fast when the mesh carries no index buffer; unindexed
// drawing is not a fallback.
pub fn build_instance_geometry(
    mesh: &BaseMesh,
    animation: &AnimationTexture,
    agent_count: u32,
    grid_width: u32,
    rng: &mut impl Rng,
) -> Result<InstanceGeometry, AssetError> {
    if mesh.indices.is_empty() {
        return Err(AssetError::MissingIndices);
    }

    let base_vertices = mesh.vertex_count();
    let total_vertices = base_vertices * agent_count as usize;

    let mut positions = Vec::with_capacity(total_vertices);
    let mut colors = Vec::with_capacity(total_vertices);
    let mut references = Vec::with_capacity(total_vertices);
    let mut seeds = Vec::with_capacity(total_vertices);

    let mut tile_seed = rng.gen::<f32>();
    for i in 0..total_vertices {
        let base_vertex = i % base_vertices;
        let agent = (i / base_vertices) as u32;

        positions.push(mesh.positions[base_vertex]);
        colors.push(mesh.colors[base_vertex]);

        let (gx, gy) = agent_grid_coord(agent, grid_width);
        references.push([
            gx as f32 / grid_width as f32,
            gy as f32 / grid_width as f32,
            base_vertex as f32 / animation.width as f32,
            animation.duration_frames as f32 / animation.height as f32,
        ]);

        // One shared draw per tile, redrawn at the start of each tile, plus
        // two per-vertex values
        if base_vertex == 0 {
            tile_seed = rng.gen::<f32>();
        }
        seeds.push([agent as f32, tile_seed, rng.gen::<f32>(), rng.gen::<f32>()]);
    }

    // Indices tile with a per-agent vertex offset so every copy addresses
    // its own tile
    let indices_per_agent = mesh.indices.len() as u32;
    let mut indices = Vec::with_capacity((indices_per_agent * agent_count) as usize);
    for agent in 0..agent_count {
        let offset = agent * base_vertices as u32;
        for &index in &mesh.indices {
            indices.push(index + offset);
        }
    }

    Ok(InstanceGeometry {
        positions,
        colors,
        references,
        seeds,
        indices,
        indices_per_agent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn base_mesh() -> BaseMesh {
        BaseMesh {
            positions: vec![[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            colors: vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            indices: vec![0, 1, 2],
        }
    }

    fn animation() -> AnimationTexture {
        AnimationTexture {
            width: 4,
            height: 64,
            duration_frames: 60,
            texels: Vec::new(),
        }
    }

    #[test]
    fn grid_coord_is_a_bijection() {
        let grid_width = 8;
        let mut seen = HashSet::new();
        for index in 0..grid_width * grid_width {
            let (x, y) = agent_grid_coord(index, grid_width);
            assert!(x < grid_width && y < grid_width);
            assert!(seen.insert((x, y)), "duplicate coordinate for {index}");
        }
        assert_eq!(seen.len(), (grid_width * grid_width) as usize);
    }

    #[test]
    fn attributes_tile_the_base_mesh_unchanged() {
        let mesh = base_mesh();
        let mut rng = StdRng::seed_from_u64(7);
        let built = build_instance_geometry(&mesh, &animation(), 4, 2, &mut rng).unwrap();

        assert_eq!(built.positions.len(), 12);
        assert_eq!(built.colors.len(), 12);
        for agent in 0..4 {
            for v in 0..3 {
                assert_eq!(built.positions[agent * 3 + v], mesh.positions[v]);
                assert_eq!(built.colors[agent * 3 + v], mesh.colors[v]);
            }
        }
    }

    #[test]
    fn indices_are_offset_per_tile() {
        let mesh = base_mesh();
        let mut rng = StdRng::seed_from_u64(7);
        let built = build_instance_geometry(&mesh, &animation(), 3, 2, &mut rng).unwrap();

        assert_eq!(built.indices_per_agent, 3);
        assert_eq!(built.indices, vec![0, 1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn references_address_grid_and_animation_texture() {
        let mesh = base_mesh();
        let anim = animation();
        let mut rng = StdRng::seed_from_u64(7);
        let built = build_instance_geometry(&mesh, &anim, 4, 2, &mut rng).unwrap();

        // Agent 3 sits at grid (1, 1) of a 2-wide grid
        let reference = built.references[3 * 3 + 2];
        assert_eq!(reference[0], 0.5);
        assert_eq!(reference[1], 0.5);
        assert_eq!(reference[2], 2.0 / 4.0);
        assert_eq!(reference[3], 60.0 / 64.0);
    }

    #[test]
    fn seeds_are_stable_within_a_tile() {
        let mesh = base_mesh();
        let mut rng = StdRng::seed_from_u64(7);
        let built = build_instance_geometry(&mesh, &animation(), 4, 2, &mut rng).unwrap();

        for agent in 0..4 {
            let tile = &built.seeds[agent * 3..agent * 3 + 3];
            for seed in tile {
                assert_eq!(seed[0], agent as f32);
                assert_eq!(seed[1], tile[0][1]);
            }
        }
        // Different tiles draw different shared values
        assert_ne!(built.seeds[0][1], built.seeds[3][1]);
    }

    #[test]
    fn rebuild_is_idempotent_apart_from_seeds() {
        let mesh = base_mesh();
        let anim = animation();
        let mut rng_a = StdRng::seed_from_u64(1);
        let mut rng_b = StdRng::seed_from_u64(2);
        let a = build_instance_geometry(&mesh, &anim, 4, 2, &mut rng_a).unwrap();
        let b = build_instance_geometry(&mesh, &anim, 4, 2, &mut rng_b).unwrap();

        assert_eq!(a.positions, b.positions);
        assert_eq!(a.colors, b.colors);
        assert_eq!(a.indices, b.indices);
        assert_eq!(a.references, b.references);
        // The random seed fields are expected to differ between rebuilds
        assert_ne!(a.seeds, b.seeds);
    }

    #[test]
    fn unindexed_mesh_is_rejected() {
        let mesh = BaseMesh {
            positions: vec![[0.0; 3]],
            colors: vec![[0.0; 3]],
            indices: Vec::new(),
        };
        let mut rng = StdRng::seed_from_u64(7);
        let err = build_instance_geometry(&mesh, &animation(), 4, 2, &mut rng).unwrap_err();
        assert!(matches!(err, AssetError::MissingIndices));
    }
}
