/*
 * Keyframe Baker Module
 *
 * This module compresses a morph-target animation clip into a single 2D
 * rgba32float lookup table: one row per simulation frame, one column per
 * base-mesh vertex. Every instance can then read its own animation phase in
 * the render kernel with zero per-instance CPU work. Baking happens exactly
 * once during asset load and the result is immutable afterwards.
 */

use crate::assets::{AnimationClip, AssetError};

// Baked animation data, row-major rgba texels ready for texture upload
pub struct AnimationTexture {
    pub width: u32,
    pub height: u32,
    pub duration_frames: u32,
    pub texels: Vec<f32>,
}

impl AnimationTexture {
    // Texel (col, row) as an rgba slice
    pub fn texel(&self, col: u32, row: u32) -> &[f32] {
        let offset = ((row * self.width + col) * 4) as usize;
        &self.texels[offset..offset + 4]
    }

    pub fn bytes_per_row(&self) -> u32 {
        self.width * 16
    }
}

// Bake the clip into a lookup texture for the given base-mesh vertex count.
//
// Texture dimensions are the next powers of two above the clip length and
// the vertex count, which keeps texel addressing exact on the device. Rows
// at or beyond the clip length and columns at or beyond the vertex count
// stay zero.
pub fn bake_animation_texture(
    clip: &AnimationClip,
    vertex_count: usize,
) -> Result<AnimationTexture, AssetError> {
    if clip.keyframes.is_empty() {
        return Err(AssetError::MissingAnimation);
    }
    if clip.duration_frames == 0 {
        return Err(AssetError::EmptyClip);
    }

    let key_count = clip.keyframes.len();
    let duration = clip.duration_frames;
    let width = (vertex_count as u32).max(1).next_power_of_two();
    let height = duration.max(1).next_power_of_two();

    let mut texels = vec![0.0f32; (width * height * 4) as usize];

    for frame in 0..duration {
        // Fractional keyframe phase for this frame
        let phase = frame as f32 / duration as f32 * key_count as f32;
        let cur_key = (phase.floor() as usize).min(key_count - 1);
        let next_key = (cur_key + 1) % key_count;
        let t = phase.fract();

        let cur = &clip.keyframes[cur_key];
        let next = &clip.keyframes[next_key];

        for vertex in 0..vertex_count {
            let offset = ((frame * width + vertex as u32) * 4) as usize;

            // A keyframe may carry no data for this vertex (degenerate
            // channel); the texel then keeps its zero initialization.
            if let (Some(a), Some(b)) = (cur.get(vertex), next.get(vertex)) {
                for c in 0..3 {
                    texels[offset + c] = lerp(a[c], b[c], t);
                }
            }
            texels[offset + 3] = 1.0;
        }
    }

    Ok(AnimationTexture {
        width,
        height,
        duration_frames: duration,
        texels,
    })
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(keyframes: Vec<Vec<[f32; 3]>>, duration_frames: u32) -> AnimationClip {
        AnimationClip {
            keyframes,
            duration_frames,
        }
    }

    // Two constant poses, easy to interpolate by hand
    fn two_pose_clip(duration_frames: u32, vertices: usize) -> AnimationClip {
        let rest = vec![[0.0, 0.0, 0.0]; vertices];
        let flap = vec![[0.0, 1.0, 0.0]; vertices];
        clip(vec![rest, flap], duration_frames)
    }

    #[test]
    fn baked_texels_match_bracketing_keyframe_lerp() {
        let keyframes = vec![
            vec![[1.0, 0.0, -2.0], [0.5, 0.5, 0.5]],
            vec![[3.0, 4.0, 2.0], [-0.5, 1.5, 0.0]],
            vec![[-1.0, 2.0, 0.0], [0.0, 0.0, 1.0]],
        ];
        let clip = clip(keyframes.clone(), 10);
        let baked = bake_animation_texture(&clip, 2).unwrap();

        for frame in 0..10u32 {
            let phase = frame as f32 / 10.0 * 3.0;
            let cur = phase.floor() as usize;
            let next = (cur + 1) % 3;
            let t = phase.fract();

            for vertex in 0..2u32 {
                let texel = baked.texel(vertex, frame);
                for c in 0..3 {
                    let a = keyframes[cur][vertex as usize][c];
                    let b = keyframes[next][vertex as usize][c];
                    let expected = a + (b - a) * t;
                    assert!(
                        (texel[c] - expected).abs() < 1e-6,
                        "frame {frame} vertex {vertex} channel {c}: {} != {expected}",
                        texel[c]
                    );
                }
                assert_eq!(texel[3], 1.0);
            }
        }
    }

    #[test]
    fn dimensions_are_padded_to_powers_of_two() {
        // Scenario: 60-frame clip over a 3-vertex mesh
        let baked = bake_animation_texture(&two_pose_clip(60, 3), 3).unwrap();
        assert_eq!(baked.height, 64);
        assert_eq!(baked.width, 4);
        assert_eq!(baked.duration_frames, 60);

        // Rows past the clip length stay zero, alpha included
        for frame in 60..64 {
            for vertex in 0..4 {
                assert_eq!(baked.texel(vertex, frame), &[0.0, 0.0, 0.0, 0.0]);
            }
        }
    }

    #[test]
    fn columns_past_vertex_count_stay_zero() {
        let baked = bake_animation_texture(&two_pose_clip(4, 5), 5).unwrap();
        assert_eq!(baked.width, 8);
        for frame in 0..4 {
            for vertex in 5..8 {
                assert_eq!(baked.texel(vertex, frame), &[0.0, 0.0, 0.0, 0.0]);
            }
        }
    }

    #[test]
    fn missing_vertex_data_leaves_texel_untouched() {
        // Second keyframe carries fewer vertices than the mesh
        let keyframes = vec![vec![[1.0, 1.0, 1.0], [2.0, 2.0, 2.0]], vec![[0.0, 0.0, 0.0]]];
        let baked = bake_animation_texture(&clip(keyframes, 8), 2).unwrap();

        for frame in 0..8 {
            let texel = baked.texel(1, frame);
            // Displacement stays at its zero initialization; the marker
            // alpha is still written for in-range texels.
            assert_eq!(&texel[..3], &[0.0, 0.0, 0.0]);
            assert_eq!(texel[3], 1.0);
        }
    }

    #[test]
    fn single_keyframe_clip_is_constant() {
        let keyframes = vec![vec![[0.25, -0.5, 0.75]]];
        let baked = bake_animation_texture(&clip(keyframes, 6), 1).unwrap();
        for frame in 0..6 {
            let texel = baked.texel(0, frame);
            assert_eq!(&texel[..3], &[0.25, -0.5, 0.75]);
        }
    }

    #[test]
    fn zero_duration_clip_is_rejected() {
        let err = bake_animation_texture(&two_pose_clip(0, 2), 2).unwrap_err();
        assert!(matches!(err, AssetError::EmptyClip));
    }

    #[test]
    fn clip_without_keyframes_is_rejected() {
        let err = bake_animation_texture(&clip(Vec::new(), 10), 2).unwrap_err();
        assert!(matches!(err, AssetError::MissingAnimation));
    }
}
