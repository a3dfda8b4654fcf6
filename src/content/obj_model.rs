use std::path::Path;

use anyhow::Context;
use glam::Vec3;
use tracing::{debug, warn};

use crate::{
    platform::load_as_string,
    renderer::{meshes::Mesh, shaders::Vertex},
};

/// Creates a new triangle `Mesh` from an obj model. Every model in the file is
/// merged into one mesh and vertex normals are always recomputed from the
/// faces.
#[tracing::instrument(level = "info", skip(device))]
pub async fn load_obj_mesh<P>(device: &wgpu::Device, obj_file_path: P) -> anyhow::Result<Mesh>
where
    P: AsRef<Path> + std::fmt::Debug,
{
    let obj_text = load_as_string(obj_file_path.as_ref()).await?;
    let mut obj_buf_reader = std::io::BufReader::new(std::io::Cursor::new(obj_text));

    // Materials are not used for shading, but a broken reference should not
    // stop the geometry from loading.
    let (obj_models, _) = tobj::load_obj_buf_async(
        &mut obj_buf_reader,
        &tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        },
        |mtl_file_path| async move {
            match load_as_string(&mtl_file_path).await {
                Ok(mtl_text) => tobj::load_mtl_buf(&mut std::io::BufReader::new(
                    std::io::Cursor::new(mtl_text),
                )),
                Err(e) => {
                    warn!("skipping material library {mtl_file_path}: {e:#}");
                    Err(tobj::LoadError::OpenFileFailed)
                }
            }
        },
    )
    .await
    .with_context(|| format!("failed to parse obj file {obj_file_path:?}"))?;

    let (vertices, indices) = merge_obj_models(&obj_models);
    anyhow::ensure!(
        !indices.is_empty(),
        "obj file {obj_file_path:?} has no triangles"
    );

    let name = obj_file_path
        .as_ref()
        .to_str()
        .unwrap_or("invalid utf8 chars in obj file path");

    debug!(
        "loaded {} vertices and {} triangles from {name}",
        vertices.len(),
        indices.len() / 3
    );

    let mesh = Mesh::triangle_mesh(device, name, &vertices, &indices)
        .with_context(|| format!("obj file {obj_file_path:?} has invalid triangles"))?;

    Ok(mesh)
}

/// Concatenate the vertices and indices of every obj model. Expects models
/// loaded with `triangulate` and `single_index`.
fn merge_obj_models(obj_models: &[tobj::Model]) -> (Vec<Vertex>, Vec<u32>) {
    let vertex_count: usize = obj_models.iter().map(|m| m.mesh.positions.len() / 3).sum();
    let index_count: usize = obj_models.iter().map(|m| m.mesh.indices.len()).sum();

    let mut positions: Vec<Vec3> = Vec::with_capacity(vertex_count);
    let mut tex_coords: Vec<[f32; 2]> = Vec::with_capacity(vertex_count);
    let mut indices: Vec<u32> = Vec::with_capacity(index_count);

    for model in obj_models {
        let mesh = &model.mesh;
        let base_vertex = positions.len() as u32;
        let has_tex_coords = mesh.texcoords.len() * 3 == mesh.positions.len() * 2;

        for (i, p) in mesh.positions.chunks_exact(3).enumerate() {
            positions.push(Vec3::new(p[0], p[1], p[2]));
            tex_coords.push(if has_tex_coords {
                [mesh.texcoords[i * 2], mesh.texcoords[i * 2 + 1]]
            } else {
                [0.0, 0.0]
            });
        }

        indices.extend(mesh.indices.iter().map(|i| base_vertex + i));
    }

    let normals = compute_vertex_normals(&positions, &indices);
    let vertices = positions
        .iter()
        .zip(&normals)
        .zip(&tex_coords)
        .map(|((position, normal), tex_coords)| Vertex {
            position: position.to_array(),
            normal: normal.to_array(),
            tex_coords: *tex_coords,
        })
        .collect();

    (vertices, indices)
}

/// Compute per-vertex normals as the normalized sum of the unnormalized face
/// normals of every triangle using the vertex, so larger faces weigh more.
/// Vertices that belong to no triangle get a zero normal.
pub fn compute_vertex_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];

    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0], triangle[1], triangle[2]].map(|i| i as usize);
        let face_normal = (positions[b] - positions[a]).cross(positions[c] - positions[a]);

        normals[a] += face_normal;
        normals[b] += face_normal;
        normals[c] += face_normal;
    }

    normals.iter().map(|n| n.normalize_or_zero()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_triangle_normal_follows_winding() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y];

        assert_eq!(vec![Vec3::Z; 3], compute_vertex_normals(&positions, &[0, 1, 2]));
        assert_eq!(
            vec![Vec3::NEG_Z; 3],
            compute_vertex_normals(&positions, &[0, 2, 1])
        );
    }

    #[test]
    fn larger_faces_weigh_more() {
        // Vertex 0 is shared by a small triangle facing +Z and a large one
        // facing +Y.
        let positions = [
            Vec3::ZERO,
            Vec3::X * 0.1,
            Vec3::Y * 0.1,
            Vec3::Z * -10.0,
            Vec3::X * 10.0,
        ];
        let normals = compute_vertex_normals(&positions, &[0, 1, 2, 0, 4, 3]);

        assert!(normals[0].y > 0.99);
        assert!((normals[0].length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn unused_vertices_have_zero_normals() {
        let positions = [Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::ONE];
        assert_eq!(Vec3::ZERO, compute_vertex_normals(&positions, &[0, 1, 2])[3]);
    }

    #[test]
    fn bundled_icosahedron_normals_point_outwards() {
        let text = pollster::block_on(load_as_string("models/icosahedron.obj")).unwrap();
        let (models, _) = tobj::load_obj_buf(
            &mut std::io::BufReader::new(std::io::Cursor::new(text)),
            &tobj::LoadOptions {
                triangulate: true,
                single_index: true,
                ..Default::default()
            },
            |_| Err(tobj::LoadError::OpenFileFailed),
        )
        .unwrap();

        let (vertices, indices) = merge_obj_models(&models);

        assert_eq!(60, indices.len());

        for v in &vertices {
            let position = Vec3::from(v.position);
            let normal = Vec3::from(v.normal);
            assert!(position.normalize().dot(normal) > 0.7);
        }
    }
}
