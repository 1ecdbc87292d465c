//! Reference-counted texture set table.
//!
//! Multiple draw calls and meshes may share one texture set within a frame,
//! so sets are use-counted: loading an already-loaded set only increments
//! the count, and GPU textures are destroyed when the count reaches zero.
//! All mutation happens on the render thread.

use std::collections::HashMap;

use mv_core::{FilterMode, Material, TextureSet, TextureSetId, WrapMode};

use crate::context::RenderContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct SamplerKey {
    filtering: FilterMode,
    wrap_u: WrapMode,
    wrap_v: WrapMode,
    anisotropic: bool,
}

impl SamplerKey {
    fn for_material(material: &Material) -> Self {
        Self {
            filtering: material.filtering,
            wrap_u: material.wrap_u,
            wrap_v: material.wrap_v,
            anisotropic: material.anisotropic_filtering,
        }
    }
}

struct GpuTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct SetEntry {
    textures: Vec<GpuTexture>,
    uses: u32,
}

/// GPU table for material texture sets.
pub struct TextureTable {
    sets: HashMap<TextureSetId, SetEntry>,
    samplers: HashMap<SamplerKey, wgpu::Sampler>,
    bind_groups: HashMap<(Option<TextureSetId>, u32, SamplerKey), wgpu::BindGroup>,
    bind_group_layout: wgpu::BindGroupLayout,
    fallback: GpuTexture,
}

impl TextureTable {
    pub fn new(ctx: &RenderContext) -> Self {
        let bind_group_layout =
            ctx.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Material Texture Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let fallback = upload_pixels(ctx, 1, 1, &[0xFF; 4], "Fallback Texture");

        Self {
            sets: HashMap::new(),
            samplers: HashMap::new(),
            bind_groups: HashMap::new(),
            bind_group_layout,
            fallback,
        }
    }

    pub fn bind_group_layout(&self) -> &wgpu::BindGroupLayout {
        &self.bind_group_layout
    }

    /// Loads a texture set, or increments its use count when already loaded.
    pub fn load(&mut self, ctx: &RenderContext, set: &TextureSet) {
        if let Some(entry) = self.sets.get_mut(&set.id) {
            entry.uses += 1;
            return;
        }

        let textures = set
            .textures
            .iter()
            .map(|texture| {
                upload_pixels(
                    ctx,
                    texture.width(),
                    texture.height(),
                    texture.data(),
                    "Material Texture",
                )
            })
            .collect();

        tracing::debug!("buffered {} ({} textures)", set.id, set.len());
        self.sets.insert(
            set.id,
            SetEntry { textures, uses: 1 },
        );
    }

    /// Decrements a set's use count, destroying its textures at zero.
    ///
    /// Panics when the set is not loaded; unloading more often than loading
    /// is a caller bug.
    pub fn unload(&mut self, id: TextureSetId) {
        let entry = self
            .sets
            .get_mut(&id)
            .unwrap_or_else(|| panic!("{id} was not buffered"));
        if entry.uses > 1 {
            entry.uses -= 1;
            return;
        }

        self.sets.remove(&id);
        self.bind_groups.retain(|(set, _, _), _| *set != Some(id));
        tracing::debug!("released {id}");
    }

    /// Re-uploads the pixel contents of an already-loaded set.
    ///
    /// The set must carry the same texture count and dimensions it was
    /// loaded with. The use count is not affected.
    pub fn rebuffer(&mut self, ctx: &RenderContext, set: &TextureSet) {
        let entry = self
            .sets
            .get(&set.id)
            .unwrap_or_else(|| panic!("{} was not buffered", set.id));
        assert_eq!(
            entry.textures.len(),
            set.textures.len(),
            "{}: texture count changed between uploads",
            set.id
        );

        for (gpu, texture) in entry.textures.iter().zip(&set.textures) {
            write_pixels(ctx, &gpu.texture, texture.width(), texture.height(), texture.data());
        }
    }

    pub fn is_loaded(&self, id: TextureSetId) -> bool {
        self.sets.contains_key(&id)
    }

    /// Number of textures in a loaded set, 0 when not loaded.
    pub fn texture_count(&self, id: TextureSetId) -> usize {
        self.sets.get(&id).map_or(0, |entry| entry.textures.len())
    }

    /// Returns a bind group for the given texture selection, falling back to
    /// a 1x1 white texture when the set or index cannot be resolved.
    pub fn bind_group(
        &mut self,
        ctx: &RenderContext,
        set: Option<TextureSetId>,
        material: &Material,
    ) -> wgpu::BindGroup {
        let resolved = set.filter(|id| {
            self.sets
                .get(id)
                .is_some_and(|entry| (material.texture_index as usize) < entry.textures.len())
        });
        let key = (resolved, material.texture_index, SamplerKey::for_material(material));

        if let Some(bind_group) = self.bind_groups.get(&key) {
            return bind_group.clone();
        }

        let view = match resolved {
            Some(id) => &self.sets[&id].textures[material.texture_index as usize].view,
            None => &self.fallback.view,
        };
        let sampler = self
            .samplers
            .entry(key.2)
            .or_insert_with(|| ctx.create_sampler(&sampler_descriptor(key.2)));

        let bind_group = ctx.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Material Texture Bind Group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });
        self.bind_groups.insert(key, bind_group.clone());
        bind_group
    }
}

fn sampler_descriptor(key: SamplerKey) -> wgpu::SamplerDescriptor<'static> {
    let address = |wrap: WrapMode| match wrap {
        WrapMode::Repeat => wgpu::AddressMode::Repeat,
        WrapMode::Mirror => wgpu::AddressMode::MirrorRepeat,
        WrapMode::Clamp => wgpu::AddressMode::ClampToEdge,
    };
    let (mag, min, mip) = match key.filtering {
        FilterMode::Nearest => (
            wgpu::FilterMode::Nearest,
            wgpu::FilterMode::Nearest,
            wgpu::FilterMode::Nearest,
        ),
        FilterMode::Bilinear => (
            wgpu::FilterMode::Linear,
            wgpu::FilterMode::Linear,
            wgpu::FilterMode::Nearest,
        ),
        FilterMode::Trilinear => (
            wgpu::FilterMode::Linear,
            wgpu::FilterMode::Linear,
            wgpu::FilterMode::Linear,
        ),
    };
    // Anisotropy requires all-linear filtering in wgpu.
    let anisotropy_clamp = if key.anisotropic && key.filtering == FilterMode::Trilinear {
        4
    } else {
        1
    };

    wgpu::SamplerDescriptor {
        label: Some("Material Sampler"),
        address_mode_u: address(key.wrap_u),
        address_mode_v: address(key.wrap_v),
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter: mag,
        min_filter: min,
        mipmap_filter: mip,
        anisotropy_clamp,
        ..Default::default()
    }
}

fn upload_pixels(
    ctx: &RenderContext,
    width: u32,
    height: u32,
    data: &[u8],
    label: &str,
) -> GpuTexture {
    let texture = ctx.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8Unorm,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    write_pixels(ctx, &texture, width, height, data);
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    GpuTexture { texture, view }
}

fn write_pixels(ctx: &RenderContext, texture: &wgpu::Texture, width: u32, height: u32, data: &[u8]) {
    ctx.queue().write_texture(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
}
