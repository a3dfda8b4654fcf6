//! NOTES:
//! Mesh vertex winding order is CCW when viewed from outside.
//! Builtin cubes and planes span [-1, 1] on each of their axes.
use glam::Vec3;
use thiserror::Error;
use wgpu::util::DeviceExt;

use super::{
    scene::SceneItem,
    shaders::{NormalLineVertex, Vertex},
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MeshError {
    #[error("mesh {name} has {index_count} indices which is not a triangle list")]
    NotTriangleList { name: String, index_count: usize },
    #[error("mesh {name} references vertex {index} but only has {vertex_count} vertices")]
    IndexOutOfRange {
        name: String,
        index: u32,
        vertex_count: usize,
    },
}

/// The closed set of drawable mesh variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MeshKind {
    Cube,
    /// A horizontal square facing +Y.
    Plane,
    /// Arbitrary indexed triangles, usually loaded from a model file.
    TriangleMesh,
    /// Two triangles covering clip space, for full screen passes.
    ScreenQuad,
    /// A unit cube drawn from the inside for environment maps.
    Skybox,
}

/// GPU vertex and index buffers for one mesh along with the CPU side vertex
/// positions needed to size the scene bounds.
pub struct Mesh {
    kind: MeshKind,
    name: String,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    /// Line list with one line per vertex, see `normal_lines`.
    normal_line_buffer: wgpu::Buffer,
    normal_line_vertex_count: u32,
    positions: Vec<Vec3>,
}

impl Mesh {
    /// Create a mesh from vertices and triangle list indices that are already
    /// known to be valid.
    fn new(
        device: &wgpu::Device,
        kind: MeshKind,
        name: &str,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Self {
        debug_assert_eq!(Ok(()), validate_triangle_list(name, vertices.len(), indices));

        let normal_lines = normal_lines(vertices);
        let normal_line_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{name} normal line buffer")),
            contents: bytemuck::cast_slice(&normal_lines),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{name} vertex buffer")),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{name} index buffer")),
            contents: bytemuck::cast_slice(indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self {
            kind,
            name: name.to_string(),
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
            normal_line_buffer,
            normal_line_vertex_count: normal_lines.len() as u32,
            positions: vertices.iter().map(|v| Vec3::from(v.position)).collect(),
        }
    }

    pub fn cube(device: &wgpu::Device) -> Self {
        let (vertices, indices) = cube_geometry();
        Self::new(device, MeshKind::Cube, "cube", &vertices, &indices)
    }

    pub fn plane(device: &wgpu::Device) -> Self {
        let (vertices, indices) = plane_geometry();
        Self::new(device, MeshKind::Plane, "plane", &vertices, &indices)
    }

    pub fn skybox(device: &wgpu::Device) -> Self {
        let (vertices, indices) = cube_geometry();
        Self::new(device, MeshKind::Skybox, "skybox", &vertices, &indices)
    }

    pub fn screen_quad(device: &wgpu::Device) -> Self {
        let (vertices, indices) = screen_quad_geometry();
        Self::new(device, MeshKind::ScreenQuad, "screen quad", &vertices, &indices)
    }

    /// Create a mesh from loaded geometry, checking that `indices` form a
    /// triangle list over `vertices`.
    pub fn triangle_mesh(
        device: &wgpu::Device,
        name: &str,
        vertices: &[Vertex],
        indices: &[u32],
    ) -> Result<Self, MeshError> {
        validate_triangle_list(name, vertices.len(), indices)?;
        Ok(Self::new(
            device,
            MeshKind::TriangleMesh,
            name,
            vertices,
            indices,
        ))
    }

    pub fn kind(&self) -> MeshKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    /// Per-axis maximum absolute vertex coordinate after scaling by `scale`.
    pub fn bounding_extent(&self, scale: Vec3) -> Vec3 {
        bounding_extent(&self.positions, scale)
    }
}

impl std::fmt::Debug for Mesh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mesh")
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("index_count", &self.index_count)
            .finish()
    }
}

/// A trait for render passes that can draw meshes and scene items.
pub trait DrawMesh<'a> {
    /// Bind the mesh buffers and draw every triangle.
    fn draw_mesh(&mut self, mesh: &'a Mesh);
    /// Bind the item's per-model uniforms at group 1 and draw its mesh.
    fn draw_item(&mut self, item: &'a SceneItem);
    /// Bind the item's per-model uniforms at group 1 and draw the normal
    /// lines of its mesh.
    fn draw_item_normals(&mut self, item: &'a SceneItem);
}

impl<'rpass, 'a> DrawMesh<'a> for wgpu::RenderPass<'rpass>
where
    'a: 'rpass,
{
    fn draw_mesh(&mut self, mesh: &'a Mesh) {
        self.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
        self.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
        self.draw_indexed(0..mesh.index_count, 0, 0..1);
    }

    fn draw_item(&mut self, item: &'a SceneItem) {
        debug_assert!(!item.uniforms().is_dirty());

        self.set_bind_group(1, item.uniforms().bind_group(), &[]);
        self.draw_mesh(item.mesh());
    }

    fn draw_item_normals(&mut self, item: &'a SceneItem) {
        let mesh = item.mesh();

        self.set_bind_group(1, item.uniforms().bind_group(), &[]);
        self.set_vertex_buffer(0, mesh.normal_line_buffer.slice(..));
        self.draw(0..mesh.normal_line_vertex_count, 0..1);
    }
}

/// Check that `indices` is a triangle list over `vertex_count` vertices.
pub fn validate_triangle_list(
    name: &str,
    vertex_count: usize,
    indices: &[u32],
) -> Result<(), MeshError> {
    if indices.len() % 3 != 0 {
        return Err(MeshError::NotTriangleList {
            name: name.to_string(),
            index_count: indices.len(),
        });
    }

    match indices.iter().find(|i| **i as usize >= vertex_count) {
        Some(index) => Err(MeshError::IndexOutOfRange {
            name: name.to_string(),
            index: *index,
            vertex_count,
        }),
        None => Ok(()),
    }
}

/// Two line ends per vertex, a base at the vertex and a tip to be pushed out
/// along its normal.
pub fn normal_lines(vertices: &[Vertex]) -> Vec<NormalLineVertex> {
    vertices
        .iter()
        .flat_map(|v| {
            [0.0, 1.0].map(|tip| NormalLineVertex {
                position: v.position,
                normal: v.normal,
                tip,
            })
        })
        .collect()
}

/// Per-axis maximum of `|scale * p|` over all `positions`.
pub fn bounding_extent(positions: &[Vec3], scale: Vec3) -> Vec3 {
    positions
        .iter()
        .fold(Vec3::ZERO, |extent, p| extent.max((*p * scale).abs()))
}

/// Face normals paired with two in-face axes `u` and `v` where `u x v` is the
/// normal, so corners walked (-u-v, +u-v, +u+v, -u+v) wind CCW from outside.
const CUBE_FACE_AXES: [(Vec3, Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::Y, Vec3::Z),
    (Vec3::NEG_X, Vec3::Z, Vec3::Y),
    (Vec3::Y, Vec3::Z, Vec3::X),
    (Vec3::NEG_Y, Vec3::X, Vec3::Z),
    (Vec3::Z, Vec3::X, Vec3::Y),
    (Vec3::NEG_Z, Vec3::Y, Vec3::X),
];

const QUAD_CORNERS: [(f32, f32); 4] = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

fn push_quad(
    vertices: &mut Vec<Vertex>,
    indices: &mut Vec<u32>,
    center: Vec3,
    normal: Vec3,
    u: Vec3,
    v: Vec3,
) {
    let base = vertices.len() as u32;

    for (a, b) in QUAD_CORNERS {
        vertices.push(Vertex {
            position: (center + u * a + v * b).to_array(),
            normal: normal.to_array(),
            tex_coords: [(a + 1.0) * 0.5, (1.0 - b) * 0.5],
        });
    }

    indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
}

/// A cube spanning [-1, 1] with four vertices per face.
pub fn cube_geometry() -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, u, v) in CUBE_FACE_AXES {
        push_quad(&mut vertices, &mut indices, normal, normal, u, v);
    }

    (vertices, indices)
}

/// A square on the XZ plane spanning [-1, 1] and facing +Y.
pub fn plane_geometry() -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(4);
    let mut indices = Vec::with_capacity(6);

    push_quad(&mut vertices, &mut indices, Vec3::ZERO, Vec3::Y, Vec3::Z, Vec3::X);
    (vertices, indices)
}

/// A clip space quad at depth zero. Texture coordinates put (0, 0) at the top
/// left corner of the screen.
pub fn screen_quad_geometry() -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(4);
    let mut indices = Vec::with_capacity(6);

    push_quad(&mut vertices, &mut indices, Vec3::ZERO, Vec3::Z, Vec3::X, Vec3::Y);
    (vertices, indices)
}
