//! Texture set contract.
//!
//! The renderer does not decode image formats; texture providers hand over
//! raw RGBA8 pixel buffers with their dimensions.

use serde::{Deserialize, Serialize};

/// Caller-stable identity of a texture set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextureSetId(pub u64);

impl std::fmt::Display for TextureSetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "textures#{}", self.0)
    }
}

/// Texture-related errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TextureError {
    #[error("pixel buffer holds {actual} bytes, {expected} required for {width}x{height} RGBA8")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("texture dimensions must be non-zero")]
    EmptyTexture,
}

/// One raw RGBA8 texture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Texture {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Texture {
    /// Creates a texture from raw RGBA8 pixels (4 bytes per pixel, rows
    /// top to bottom).
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Result<Self, TextureError> {
        if width == 0 || height == 0 {
            return Err(TextureError::EmptyTexture);
        }
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(TextureError::SizeMismatch {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 pixel bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// An ordered collection of textures referenced by material texture indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureSet {
    pub id: TextureSetId,
    pub textures: Vec<Texture>,
}

impl TextureSet {
    pub fn new(id: TextureSetId, textures: Vec<Texture>) -> Self {
        Self { id, textures }
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_mismatched_pixel_buffer() {
        assert!(matches!(
            Texture::new(2, 2, vec![0; 15]),
            Err(TextureError::SizeMismatch { expected: 16, .. })
        ));
        assert!(Texture::new(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn rejects_empty_dimensions() {
        assert!(matches!(
            Texture::new(0, 4, Vec::new()),
            Err(TextureError::EmptyTexture)
        ));
    }
}
