// SPDX-License-Identifier: CEPL-1.0
use std::rc::Rc;

use anyhow::Result;
use glow::HasContext as _;

use crate::buffer::Buffer;

/// One float vector attribute: `size` components at byte `offset`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Attribute {
    pub size: i32,
    pub offset: i32,
}

/// Tightly packed float attributes, in order. Returns the layout and stride.
pub fn packed_layout(sizes: &[i32]) -> (Vec<Attribute>, i32) {
    let mut stride = 0;
    let attributes = sizes
        .iter()
        .map(|&size| {
            let a = Attribute {
                size,
                offset: stride,
            };
            stride += size * std::mem::size_of::<f32>() as i32;
            a
        })
        .collect();
    (attributes, stride)
}

/// Whole vertices in `float_len` packed floats of the given layout.
pub fn vertex_count(float_len: usize, sizes: &[i32]) -> i32 {
    let per_vertex: i32 = sizes.iter().sum();
    if per_vertex <= 0 {
        return 0;
    }
    (float_len / per_vertex as usize) as i32
}

/// Vertex array object. Attribute locations are handed out in call order.
pub struct VertexArray {
    gl: Rc<glow::Context>,
    raw: glow::VertexArray,
    next_attribute: u32,
    element_buffer_bound: bool,
}

impl VertexArray {
    pub fn new(gl: &Rc<glow::Context>) -> Result<Self> {
        let raw = unsafe { gl.create_vertex_array() }.map_err(anyhow::Error::msg)?;
        Ok(Self {
            gl: Rc::clone(gl),
            raw,
            next_attribute: 0,
            element_buffer_bound: false,
        })
    }

    pub fn raw(&self) -> glow::VertexArray {
        self.raw
    }

    pub fn attribute_count(&self) -> u32 {
        self.next_attribute
    }

    pub fn has_element_buffer(&self) -> bool {
        self.element_buffer_bound
    }

    /// Packed float attributes of the given component counts. Returns the
    /// locations assigned.
    pub fn bind_vertex_buffer(
        &mut self,
        buffer: &Buffer,
        sizes: &[i32],
        offset: i32,
    ) -> std::ops::Range<u32> {
        let (attributes, stride) = packed_layout(sizes);
        self.bind_vertex_buffer_attributes(buffer, &attributes, stride, offset)
    }

    pub fn bind_vertex_buffer_attributes(
        &mut self,
        buffer: &Buffer,
        attributes: &[Attribute],
        stride: i32,
        offset: i32,
    ) -> std::ops::Range<u32> {
        let first = self.next_attribute;
        unsafe {
            self.gl.bind_vertex_array(Some(self.raw));
            self.gl.bind_buffer(glow::ARRAY_BUFFER, Some(buffer.raw()));
            for a in attributes {
                let location = self.next_attribute;
                self.next_attribute += 1;
                self.gl.enable_vertex_attrib_array(location);
                self.gl.vertex_attrib_pointer_f32(
                    location,
                    a.size,
                    glow::FLOAT,
                    false,
                    stride,
                    offset + a.offset,
                );
            }
            self.gl.bind_vertex_array(None);
            self.gl.bind_buffer(glow::ARRAY_BUFFER, None);
        }
        first..self.next_attribute
    }

    pub fn bind_element_buffer(&mut self, buffer: &Buffer) {
        // Bind, set, unbind: the element binding is recorded into the VAO.
        unsafe {
            self.gl.bind_vertex_array(Some(self.raw));
            self.gl
                .bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(buffer.raw()));
            self.gl.bind_vertex_array(None);
        }
        self.element_buffer_bound = true;
    }

    pub fn bind(&self) {
        unsafe { self.gl.bind_vertex_array(Some(self.raw)) };
    }
}

impl Drop for VertexArray {
    fn drop(&mut self) {
        unsafe { self.gl.delete_vertex_array(self.raw) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_attributes_derive_offsets_and_stride() {
        let (attrs, stride) = packed_layout(&[3, 2]);
        assert_eq!(stride, 20);
        assert_eq!(
            attrs,
            vec![
                Attribute { size: 3, offset: 0 },
                Attribute {
                    size: 2,
                    offset: 12
                }
            ]
        );
    }

    #[test]
    fn empty_layout_has_zero_stride() {
        let (attrs, stride) = packed_layout(&[]);
        assert!(attrs.is_empty());
        assert_eq!(stride, 0);
    }

    #[test]
    fn vertex_count_divides_by_components_per_vertex() {
        assert_eq!(vertex_count(9, &[3]), 3);
        assert_eq!(vertex_count(20, &[3, 2]), 4);
        assert_eq!(vertex_count(8, &[3]), 2);
        assert_eq!(vertex_count(9, &[]), 0);
    }
}
