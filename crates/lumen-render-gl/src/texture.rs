// SPDX-License-Identifier: CEPL-1.0
use std::rc::Rc;

use anyhow::Result;
use glow::HasContext as _;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureKind {
    D1,
    D2,
    D3,
    D1Array,
    D2Array,
    Rectangle,
    CubeMap,
    CubeMapArray,
    Buffer,
    D2Multisample,
    D2MultisampleArray,
}

impl TextureKind {
    pub fn raw(self) -> u32 {
        match self {
            TextureKind::D1 => glow::TEXTURE_1D,
            TextureKind::D2 => glow::TEXTURE_2D,
            TextureKind::D3 => glow::TEXTURE_3D,
            TextureKind::D1Array => glow::TEXTURE_1D_ARRAY,
            TextureKind::D2Array => glow::TEXTURE_2D_ARRAY,
            TextureKind::Rectangle => glow::TEXTURE_RECTANGLE,
            TextureKind::CubeMap => glow::TEXTURE_CUBE_MAP,
            TextureKind::CubeMapArray => glow::TEXTURE_CUBE_MAP_ARRAY,
            TextureKind::Buffer => glow::TEXTURE_BUFFER,
            TextureKind::D2Multisample => glow::TEXTURE_2D_MULTISAMPLE,
            TextureKind::D2MultisampleArray => glow::TEXTURE_2D_MULTISAMPLE_ARRAY,
        }
    }
}

/// Texture object of a fixed kind. Storage and sampling setup stay with the
/// caller.
pub struct Texture {
    gl: Rc<glow::Context>,
    raw: glow::Texture,
    kind: TextureKind,
}

impl Texture {
    pub fn new(gl: &Rc<glow::Context>, kind: TextureKind) -> Result<Self> {
        let raw = unsafe { gl.create_texture() }.map_err(anyhow::Error::msg)?;
        Ok(Self {
            gl: Rc::clone(gl),
            raw,
            kind,
        })
    }

    pub fn raw(&self) -> glow::Texture {
        self.raw
    }

    pub fn kind(&self) -> TextureKind {
        self.kind
    }

    pub fn bind(&self) {
        unsafe { self.gl.bind_texture(self.kind.raw(), Some(self.raw)) };
    }

    /// Selects texture unit `n` for subsequent binds.
    pub fn set_active_unit(gl: &glow::Context, n: u8) {
        unsafe { gl.active_texture(glow::TEXTURE0 + u32::from(n)) };
    }
}

impl Drop for Texture {
    fn drop(&mut self) {
        unsafe { self.gl.delete_texture(self.raw) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_gl_targets() {
        assert_eq!(TextureKind::D2.raw(), glow::TEXTURE_2D);
        assert_eq!(TextureKind::CubeMap.raw(), glow::TEXTURE_CUBE_MAP);
        assert_eq!(TextureKind::D2Array.raw(), glow::TEXTURE_2D_ARRAY);
    }
}
