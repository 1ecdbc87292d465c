//! Fixed-layout uniform blocks.
//!
//! Field order and bit packing in this module are a wire contract with the
//! WGSL shaders; any reordering is a breaking change. Blocks are plain
//! `Pod` structs written verbatim into uniform buffers.

use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use mv_core::{BlendFactor, Material};

use crate::camera::Camera;
use crate::context::RenderContext;
use crate::lighting::{LIGHT_COUNT, Light};
use crate::matrices::RenderMatrices;
use crate::settings::RenderSettings;

/// Surface flag word bits. Low byte: blend codes and the transparency mark;
/// the byte above it: material attributes; top bits: vertex layout.
pub mod surface_flags {
    /// Mask of the 3-bit source blend factor code.
    pub const SRC_BLEND_MASK: u32 = 0x7;
    /// Shift of the 3-bit destination blend factor code.
    pub const DST_BLEND_SHIFT: u32 = 3;
    /// The surface is rendered transparent.
    pub const IS_ALPHA: u32 = 0x80;
    /// Shift applied to the material attribute bits.
    pub const ATTRIBUTE_SHIFT: u32 = 8;
    /// The vertex layout carries colors.
    pub const HAS_COLORS: u32 = 1 << 30;
    /// The vertex layout carries normals.
    pub const HAS_NORMALS: u32 = 1 << 31;
}

/// Per-draw matrix block: world, world-normal, MVP.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MatrixUniforms {
    pub world: [[f32; 4]; 4],
    pub world_normal: [[f32; 4]; 4],
    pub mvp: [[f32; 4]; 4],
}

impl From<&RenderMatrices> for MatrixUniforms {
    fn from(matrices: &RenderMatrices) -> Self {
        Self {
            world: matrices.world.to_cols_array_2d(),
            world_normal: matrices.world_normal.to_cols_array_2d(),
            mvp: matrices.mvp.to_cols_array_2d(),
        }
    }
}

/// Per-frame settings block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SettingsUniforms {
    pub disable_lighting: u32,
    pub disable_specular: u32,
    pub disable_surface_ambient: u32,
    pub _pad: u32,
}

impl From<&RenderSettings> for SettingsUniforms {
    fn from(settings: &RenderSettings) -> Self {
        Self {
            disable_lighting: settings.disable_lighting as u32,
            disable_specular: settings.disable_specular as u32,
            disable_surface_ambient: settings.disable_surface_ambient as u32,
            _pad: 0,
        }
    }
}

/// Per-frame camera block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CameraUniforms {
    pub position: [f32; 3],
    pub _pad0: f32,
    pub forward: [f32; 3],
    pub _pad1: f32,
}

impl From<&Camera> for CameraUniforms {
    fn from(camera: &Camera) -> Self {
        Self {
            position: camera.real_position().to_array(),
            _pad0: 0.0,
            forward: camera.forward().to_array(),
            _pad1: 0.0,
        }
    }
}

/// One light slot, padded to a 64-byte stride.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightUniform {
    pub direction: [f32; 3],
    pub _pad0: f32,
    pub diffuse: [f32; 4],
    pub ambient: [f32; 4],
    pub diffuse_intensity: f32,
    pub ambient_intensity: f32,
    pub _pad1: [f32; 2],
}

impl From<&Light> for LightUniform {
    fn from(light: &Light) -> Self {
        Self {
            direction: light.direction.to_array(),
            _pad0: 0.0,
            diffuse: light.diffuse.to_vec4().to_array(),
            ambient: light.ambient.to_vec4().to_array(),
            diffuse_intensity: light.diffuse_intensity,
            ambient_intensity: light.ambient_intensity,
            _pad1: [0.0; 2],
        }
    }
}

/// The four-slot light array block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LightingUniforms {
    pub lights: [LightUniform; LIGHT_COUNT],
}

impl From<&[Light; LIGHT_COUNT]> for LightingUniforms {
    fn from(lights: &[Light; LIGHT_COUNT]) -> Self {
        Self {
            lights: std::array::from_fn(|i| LightUniform::from(&lights[i])),
        }
    }
}

/// Per-draw surface material block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SurfaceUniforms {
    pub diffuse: [f32; 4],
    pub specular: [f32; 4],
    pub ambient: [f32; 4],
    pub specular_exponent: f32,
    pub flags: u32,
    pub _pad: [f32; 2],
}

impl SurfaceUniforms {
    /// Builds the surface block for one draw.
    ///
    /// `texture_available` tells whether the active texture set can satisfy
    /// the material's texture index; when it cannot, the use-texture
    /// attribute is masked off.
    pub fn build(
        material: &Material,
        settings: &RenderSettings,
        has_normals: bool,
        has_colors: bool,
        texture_available: bool,
    ) -> Self {
        let mut diffuse = material.diffuse.to_vec4();
        // A global transparency subtract fades every surface, including
        // opaque ones, which are then force-flagged transparent below.
        diffuse.w = if material.use_alpha {
            (diffuse.w - settings.transparency_subtract).max(0.0)
        } else {
            (1.0 - settings.transparency_subtract).max(0.0)
        };

        Self {
            diffuse: diffuse.to_array(),
            specular: material.specular.to_vec4().to_array(),
            ambient: material.ambient.to_vec4().to_array(),
            specular_exponent: material.specular_exponent,
            flags: pack_surface_flags(
                material,
                settings,
                has_normals,
                has_colors,
                texture_available,
            ),
            _pad: [0.0; 2],
        }
    }

    pub fn diffuse_vec4(&self) -> Vec4 {
        Vec4::from_array(self.diffuse)
    }
}

/// Packs the surface flag word.
pub fn pack_surface_flags(
    material: &Material,
    settings: &RenderSettings,
    has_normals: bool,
    has_colors: bool,
    texture_available: bool,
) -> u32 {
    let mut attributes = material.attribute_bits();
    if !texture_available {
        attributes &= !mv_core::material::attributes::USE_TEXTURE;
    }

    let mut flags = attributes << surface_flags::ATTRIBUTE_SHIFT;

    if material.use_alpha {
        flags |= material.src_blend.bits();
        flags |= material.dst_blend.bits() << surface_flags::DST_BLEND_SHIFT;
        flags |= surface_flags::IS_ALPHA;
    } else if settings.transparency_subtract > 0.0 {
        flags |= BlendFactor::SrcAlpha.bits();
        flags |= BlendFactor::SrcAlphaInverted.bits() << surface_flags::DST_BLEND_SHIFT;
        flags |= surface_flags::IS_ALPHA;
    }

    if has_normals {
        flags |= surface_flags::HAS_NORMALS;
    }
    if has_colors {
        flags |= surface_flags::HAS_COLORS;
    }

    flags
}

/// A uniform buffer holding one `Pod` block.
pub struct UniformBuffer<T: Pod> {
    buffer: wgpu::Buffer,
    _marker: std::marker::PhantomData<T>,
}

impl<T: Pod> UniformBuffer<T> {
    pub fn new(ctx: &RenderContext, label: &str) -> Self {
        let buffer = ctx.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: size_of::<T>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            _marker: std::marker::PhantomData,
        }
    }

    pub fn write(&self, ctx: &RenderContext, value: &T) {
        ctx.write_buffer(&self.buffer, 0, bytemuck::bytes_of(value));
    }

    pub fn buffer(&self) -> &wgpu::Buffer {
        &self.buffer
    }
}

/// Per-frame uniform stream.
///
/// Per-draw blocks (matrices, surface) and mid-frame settings changes are
/// streamed into fixed arenas and addressed with dynamic offsets, since a
/// buffer cannot be rewritten between draws of an already-recorded pass.
/// Camera and lighting are published once per frame.
pub struct FrameUniforms {
    camera: UniformBuffer<CameraUniforms>,
    lighting: UniformBuffer<LightingUniforms>,

    matrix_arena: wgpu::Buffer,
    matrix_stride: u32,
    matrix_cursor: u32,
    surface_arena: wgpu::Buffer,
    surface_stride: u32,
    surface_cursor: u32,
    settings_arena: wgpu::Buffer,
    settings_stride: u32,
    settings_cursor: u32,

    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
}

/// Per-frame capacity of the per-draw arenas.
pub const MAX_DRAWS_PER_FRAME: u32 = 4096;
/// Per-frame capacity of mid-frame settings changes.
pub const MAX_SETTINGS_CHANGES: u32 = 64;

impl FrameUniforms {
    pub fn new(ctx: &RenderContext) -> Self {
        let camera = UniformBuffer::new(ctx, "Camera Uniforms");
        let lighting = UniformBuffer::new(ctx, "Lighting Uniforms");

        let matrix_stride = ctx.uniform_stride(size_of::<MatrixUniforms>() as u64) as u32;
        let surface_stride = ctx.uniform_stride(size_of::<SurfaceUniforms>() as u64) as u32;
        let settings_stride = ctx.uniform_stride(size_of::<SettingsUniforms>() as u64) as u32;

        let arena = |label: &str, stride: u32, slots: u32| {
            ctx.create_buffer(&wgpu::BufferDescriptor {
                label: Some(label),
                size: stride as u64 * slots as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            })
        };
        let matrix_arena = arena("Matrix Uniform Arena", matrix_stride, MAX_DRAWS_PER_FRAME);
        let surface_arena = arena("Surface Uniform Arena", surface_stride, MAX_DRAWS_PER_FRAME);
        let settings_arena = arena("Settings Uniform Arena", settings_stride, MAX_SETTINGS_CHANGES);

        let uniform_entry = |binding, dynamic, size: u64| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: dynamic,
                min_binding_size: wgpu::BufferSize::new(size),
            },
            count: None,
        };
        let bind_group_layout = ctx.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Shading Uniforms Bind Group Layout"),
            entries: &[
                uniform_entry(0, true, size_of::<MatrixUniforms>() as u64),
                uniform_entry(1, true, size_of::<SettingsUniforms>() as u64),
                uniform_entry(2, false, size_of::<CameraUniforms>() as u64),
                uniform_entry(3, false, size_of::<LightingUniforms>() as u64),
                uniform_entry(4, true, size_of::<SurfaceUniforms>() as u64),
            ],
        });

        fn sized(buffer: &wgpu::Buffer, size: u64) -> wgpu::BindingResource<'_> {
            wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer,
                offset: 0,
                size: wgpu::BufferSize::new(size),
            })
        }
        let bind_group = ctx.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Shading Uniforms Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: sized(&matrix_arena, size_of::<MatrixUniforms>() as u64),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: sized(&settings_arena, size_of::<SettingsUniforms>() as u64),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: camera.buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: lighting.buffer().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: sized(&surface_arena, size_of::<SurfaceUniforms>() as u64),
                },
            ],
        });

        Self {
            camera,
            lighting,
            matrix_arena,
            matrix_stride,
            matrix_cursor: 0,
            surface_arena,
            surface_stride,
            surface_cursor: 0,
            settings_arena,
            settings_stride,
            settings_cursor: 0,
            bind_group_layout,
            bind_group,
        }
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    pub fn bind_group(&self) -> &wgpu::BindGroup {
        &self.bind_group
    }

    /// Publishes the per-frame blocks and opens the arenas for a new frame.
    /// Returns the dynamic offset of the initial settings block.
    pub fn begin_frame(
        &mut self,
        ctx: &RenderContext,
        camera: &CameraUniforms,
        lighting: &LightingUniforms,
        settings: &SettingsUniforms,
    ) -> u32 {
        self.matrix_cursor = 0;
        self.surface_cursor = 0;
        self.settings_cursor = 0;
        self.camera.write(ctx, camera);
        self.lighting.write(ctx, lighting);
        self.push_settings(ctx, settings)
    }

    /// Streams one matrix block, returning its dynamic offset.
    pub fn push_matrices(&mut self, ctx: &RenderContext, block: &MatrixUniforms) -> u32 {
        assert!(
            self.matrix_cursor < MAX_DRAWS_PER_FRAME,
            "frame exceeds {MAX_DRAWS_PER_FRAME} draws"
        );
        let offset = self.matrix_cursor * self.matrix_stride;
        ctx.write_buffer(&self.matrix_arena, offset as u64, bytemuck::bytes_of(block));
        self.matrix_cursor += 1;
        offset
    }

    /// Streams one surface block, returning its dynamic offset.
    pub fn push_surface(&mut self, ctx: &RenderContext, block: &SurfaceUniforms) -> u32 {
        assert!(
            self.surface_cursor < MAX_DRAWS_PER_FRAME,
            "frame exceeds {MAX_DRAWS_PER_FRAME} draws"
        );
        let offset = self.surface_cursor * self.surface_stride;
        ctx.write_buffer(&self.surface_arena, offset as u64, bytemuck::bytes_of(block));
        self.surface_cursor += 1;
        offset
    }

    /// Streams one settings block, returning its dynamic offset.
    pub fn push_settings(&mut self, ctx: &RenderContext, block: &SettingsUniforms) -> u32 {
        assert!(
            self.settings_cursor < MAX_SETTINGS_CHANGES,
            "frame exceeds {MAX_SETTINGS_CHANGES} settings changes"
        );
        let offset = self.settings_cursor * self.settings_stride;
        ctx.write_buffer(&self.settings_arena, offset as u64, bytemuck::bytes_of(block));
        self.settings_cursor += 1;
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mv_core::material::attributes;

    #[test]
    fn block_sizes_match_wire_layout() {
        assert_eq!(size_of::<MatrixUniforms>(), 192);
        assert_eq!(size_of::<SettingsUniforms>(), 16);
        assert_eq!(size_of::<CameraUniforms>(), 32);
        assert_eq!(size_of::<LightUniform>(), 64);
        assert_eq!(size_of::<LightingUniforms>(), 256);
        assert_eq!(size_of::<SurfaceUniforms>(), 64);
    }

    #[test]
    fn light_field_offsets() {
        assert_eq!(std::mem::offset_of!(LightUniform, diffuse), 16);
        assert_eq!(std::mem::offset_of!(LightUniform, ambient), 32);
        assert_eq!(std::mem::offset_of!(LightUniform, diffuse_intensity), 48);
        assert_eq!(std::mem::offset_of!(SurfaceUniforms, specular_exponent), 48);
        assert_eq!(std::mem::offset_of!(SurfaceUniforms, flags), 52);
    }

    #[test]
    fn alpha_material_packs_its_blend_codes() {
        let material = Material {
            use_alpha: true,
            src_blend: BlendFactor::SrcAlpha,
            dst_blend: BlendFactor::One,
            ..Material::default()
        };
        let flags = pack_surface_flags(&material, &RenderSettings::default(), true, false, false);

        assert_eq!(flags & surface_flags::SRC_BLEND_MASK, 4);
        assert_eq!(flags >> surface_flags::DST_BLEND_SHIFT & 0x7, 1);
        assert_ne!(flags & surface_flags::IS_ALPHA, 0);
        assert_ne!(flags & surface_flags::HAS_NORMALS, 0);
        assert_eq!(flags & surface_flags::HAS_COLORS, 0);
    }

    #[test]
    fn transparency_subtract_forces_alpha_on_opaque_surfaces() {
        let material = Material {
            use_alpha: false,
            src_blend: BlendFactor::One,
            dst_blend: BlendFactor::Zero,
            ..Material::default()
        };
        let settings = RenderSettings {
            transparency_subtract: 0.2,
            ..RenderSettings::default()
        };

        let flags = pack_surface_flags(&material, &settings, false, false, false);
        assert_ne!(flags & surface_flags::IS_ALPHA, 0);
        assert_eq!(
            flags & surface_flags::SRC_BLEND_MASK,
            BlendFactor::SrcAlpha.bits()
        );
        assert_eq!(
            flags >> surface_flags::DST_BLEND_SHIFT & 0x7,
            BlendFactor::SrcAlphaInverted.bits()
        );

        let block = SurfaceUniforms::build(&material, &settings, false, false, false);
        assert!((block.diffuse[3] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn unavailable_texture_masks_attribute() {
        let material = Material {
            use_texture: true,
            ..Material::default()
        };
        let settings = RenderSettings::default();

        let with_texture = pack_surface_flags(&material, &settings, false, false, true);
        let without = pack_surface_flags(&material, &settings, false, false, false);

        assert_ne!(
            with_texture & (attributes::USE_TEXTURE << surface_flags::ATTRIBUTE_SHIFT),
            0
        );
        assert_eq!(
            without & (attributes::USE_TEXTURE << surface_flags::ATTRIBUTE_SHIFT),
            0
        );
    }

    #[test]
    fn opaque_surface_without_subtract_stays_opaque() {
        let flags = pack_surface_flags(
            &Material::default(),
            &RenderSettings::default(),
            true,
            true,
            false,
        );
        assert_eq!(flags & surface_flags::IS_ALPHA, 0);
        assert_eq!(flags & surface_flags::SRC_BLEND_MASK, 0);
        assert_ne!(flags & surface_flags::HAS_COLORS, 0);
    }
}
