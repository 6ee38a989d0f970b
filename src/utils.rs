use std::f32::consts::PI;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use wgpu::util::DeviceExt;

use crate::model::Geometry;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Vertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
}

pub struct MeshBuffer {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
    pub edge_buffer: wgpu::Buffer,
    pub edge_count: u32,
}

/// Triangle list for filled drawing plus a line list over the same vertices for wireframe
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub edges: Vec<u32>,
}

const SPHERE_STACKS: u32 = 16;
const SPHERE_SLICES: u32 = 24;

impl Mesh {
    pub fn for_geometry(geometry: &Geometry) -> Self {
        match *geometry {
            Geometry::Box { half_extents } => Self::cuboid(half_extents),
            Geometry::Plane { half_size } => Self::plane(half_size),
            Geometry::Sphere { radius } => Self::sphere(radius, SPHERE_STACKS, SPHERE_SLICES),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.indices.is_empty()
    }

    // corners are CCW seen from the side `normal` points to
    fn push_quad(&mut self, corners: [Vec3; 4], normal: Vec3) {
        let base = self.vertices.len() as u32;
        for c in corners {
            self.vertices.push(Vertex { pos: c.to_array(), normal: normal.to_array() });
        }
        self.indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        for i in 0..4 {
            self.push_edge(base + i, base + (i + 1) % 4);
        }
    }

    /// Adds an edge unless one between the same two positions already exists
    fn push_edge(&mut self, a: u32, b: u32) {
        let key = |i: u32| self.vertices[i as usize].pos.map(f32::to_bits);
        let (ka, kb) = (key(a), key(b));
        let exists = self.edges.chunks_exact(2).any(|e| {
            let (ea, eb) = (key(e[0]), key(e[1]));
            (ea == ka && eb == kb) || (ea == kb && eb == ka)
        });
        if !exists {
            self.edges.extend_from_slice(&[a, b]);
        }
    }

    pub fn cuboid(half_extents: Vec3) -> Self {
        // (normal, u, v) with u x v = normal
        let faces = [
            (Vec3::X, Vec3::Y, Vec3::Z),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::Z, Vec3::X),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::Y, Vec3::X),
        ];
        let mut mesh = Self::default();
        for (n, u, v) in faces {
            let corner = |su: f32, sv: f32| (n + u * su + v * sv) * half_extents;
            mesh.push_quad([corner(-1.0, -1.0), corner(1.0, -1.0), corner(1.0, 1.0), corner(-1.0, 1.0)], n);
        }
        mesh
    }

    /// Square in the XZ plane facing +Y
    pub fn plane(half_size: f32) -> Self {
        let (u, v) = (Vec3::Z * half_size, Vec3::X * half_size);
        let mut mesh = Self::default();
        mesh.push_quad([-u - v, u - v, u + v, -u + v], Vec3::Y);
        mesh
    }

    /// UV sphere; edges are the latitude rings and meridians
    pub fn sphere(radius: f32, stacks: u32, slices: u32) -> Self {
        let stacks = stacks.max(2);
        let slices = slices.max(3);
        let row = slices + 1;
        let mut mesh = Self::default();

        for i in 0..=stacks {
            let theta = PI * i as f32 / stacks as f32;
            for j in 0..=slices {
                let phi = 2.0 * PI * j as f32 / slices as f32;
                let n = Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin());
                mesh.vertices.push(Vertex { pos: (n * radius).to_array(), normal: n.to_array() });
            }
        }

        for i in 0..stacks {
            for j in 0..slices {
                let a = i * row + j;
                let b = a + row;
                if i != 0 {
                    mesh.indices.extend_from_slice(&[a, a + 1, b]);
                    mesh.edges.extend_from_slice(&[a, a + 1]);
                }
                if i != stacks - 1 {
                    mesh.indices.extend_from_slice(&[a + 1, b + 1, b]);
                }
                mesh.edges.extend_from_slice(&[a, b]);
            }
        }
        mesh
    }

    pub fn upload(&self, device: &wgpu::Device) -> MeshBuffer {
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Vertex Buffer"),
            contents: bytemuck::cast_slice(&self.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Index Buffer"),
            contents: bytemuck::cast_slice(&self.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let edge_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Mesh Edge Buffer"),
            contents: bytemuck::cast_slice(&self.edges),
            usage: wgpu::BufferUsages::INDEX,
        });

        MeshBuffer {
            vertex_buffer,
            index_buffer,
            index_count: self.indices.len() as u32,
            edge_buffer,
            edge_count: self.edges.len() as u32,
        }
    }
}
