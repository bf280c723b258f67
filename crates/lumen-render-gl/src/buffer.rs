// SPDX-License-Identifier: CEPL-1.0
use std::rc::Rc;

use anyhow::{anyhow, Result};
use glow::HasContext as _;

/// Byte range inside a buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Range {
    pub offset: usize,
    pub size: usize,
}

impl Range {
    pub const fn new(offset: usize, size: usize) -> Self {
        Self { offset, size }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    Array,
    ElementArray,
    Uniform,
    ShaderStorage,
    CopyRead,
    CopyWrite,
    DrawIndirect,
    PixelUnpack,
}

impl Target {
    pub fn raw(self) -> u32 {
        match self {
            Target::Array => glow::ARRAY_BUFFER,
            Target::ElementArray => glow::ELEMENT_ARRAY_BUFFER,
            Target::Uniform => glow::UNIFORM_BUFFER,
            Target::ShaderStorage => glow::SHADER_STORAGE_BUFFER,
            Target::CopyRead => glow::COPY_READ_BUFFER,
            Target::CopyWrite => glow::COPY_WRITE_BUFFER,
            Target::DrawIndirect => glow::DRAW_INDIRECT_BUFFER,
            Target::PixelUnpack => glow::PIXEL_UNPACK_BUFFER,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Usage {
    StreamDraw,
    StaticDraw,
    DynamicDraw,
    StreamRead,
    StaticRead,
    DynamicRead,
    StreamCopy,
    StaticCopy,
    DynamicCopy,
}

impl Usage {
    pub fn raw(self) -> u32 {
        match self {
            Usage::StreamDraw => glow::STREAM_DRAW,
            Usage::StaticDraw => glow::STATIC_DRAW,
            Usage::DynamicDraw => glow::DYNAMIC_DRAW,
            Usage::StreamRead => glow::STREAM_READ,
            Usage::StaticRead => glow::STATIC_READ,
            Usage::DynamicRead => glow::DYNAMIC_READ,
            Usage::StreamCopy => glow::STREAM_COPY,
            Usage::StaticCopy => glow::STATIC_COPY,
            Usage::DynamicCopy => glow::DYNAMIC_COPY,
        }
    }
}

/// How an upload of `new_size` bytes with `new_usage` reaches the driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Upload {
    /// Reallocate the data store.
    Realloc,
    /// Overwrite the existing store in place.
    SubData,
}

pub fn plan_upload(size: usize, usage: Usage, new_size: usize, new_usage: Usage) -> Upload {
    if size != new_size || usage != new_usage {
        Upload::Realloc
    } else {
        Upload::SubData
    }
}

/// `pattern` repeated over `size` bytes. Like `glClearBufferSubData`, the
/// range must hold a whole number of elements.
pub fn fill_pattern(pattern: &[u8], size: usize) -> Result<Vec<u8>> {
    if pattern.is_empty() {
        return Err(anyhow!("clear pattern is empty"));
    }
    if size % pattern.len() != 0 {
        return Err(anyhow!(
            "clear range of {size} bytes is not a multiple of the {} byte element",
            pattern.len()
        ));
    }
    Ok(pattern.repeat(size / pattern.len()))
}

/// Access rules `glMapBufferRange` enforces, checked up front.
pub fn check_map(buffer_size: usize, range: Range, access: u32) -> Result<()> {
    if range.size == 0 || range.offset + range.size > buffer_size {
        return Err(anyhow!(
            "map {}..{} invalid for {buffer_size} byte buffer",
            range.offset,
            range.offset + range.size
        ));
    }
    let read = access & glow::MAP_READ_BIT != 0;
    let write = access & glow::MAP_WRITE_BIT != 0;
    if !read && !write {
        return Err(anyhow!("map access needs MAP_READ_BIT or MAP_WRITE_BIT"));
    }
    let invalidate = glow::MAP_INVALIDATE_RANGE_BIT
        | glow::MAP_INVALIDATE_BUFFER_BIT
        | glow::MAP_UNSYNCHRONIZED_BIT;
    if read && access & invalidate != 0 {
        return Err(anyhow!("read mapping cannot invalidate or skip synchronization"));
    }
    if access & glow::MAP_FLUSH_EXPLICIT_BIT != 0 && !write {
        return Err(anyhow!("explicit flushing needs a write mapping"));
    }
    Ok(())
}

fn gl_size(n: usize) -> Result<i32> {
    i32::try_from(n).map_err(|_| anyhow!("buffer size {n} exceeds GLsizeiptr range"))
}

/// GL buffer object. Tracks its allocated size and usage; uploads go through
/// the copy-write binding so draw bindings stay untouched.
pub struct Buffer {
    gl: Rc<glow::Context>,
    raw: glow::Buffer,
    size: usize,
    usage: Usage,
    immutable: bool,
}

impl Buffer {
    pub fn new(gl: &Rc<glow::Context>, data: &[u8], usage: Usage) -> Result<Self> {
        let raw = unsafe { gl.create_buffer() }.map_err(anyhow::Error::msg)?;
        let mut buffer = Self {
            gl: Rc::clone(gl),
            raw,
            size: 0,
            usage,
            immutable: false,
        };
        buffer.realloc(data, usage)?;
        Ok(buffer)
    }

    pub fn from_slice<T: bytemuck::Pod>(
        gl: &Rc<glow::Context>,
        data: &[T],
        usage: Usage,
    ) -> Result<Self> {
        Self::new(gl, bytemuck::cast_slice(data), usage)
    }

    pub fn raw(&self) -> glow::Buffer {
        self.raw
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn usage(&self) -> Usage {
        self.usage
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    fn realloc(&mut self, data: &[u8], usage: Usage) -> Result<()> {
        if self.immutable {
            return Err(anyhow!("buffer has immutable storage"));
        }
        gl_size(data.len())?;
        unsafe {
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, Some(self.raw));
            self.gl
                .buffer_data_u8_slice(glow::COPY_WRITE_BUFFER, data, usage.raw());
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);
        }
        self.size = data.len();
        self.usage = usage;
        Ok(())
    }

    /// Same size: in-place update; different size: reallocation.
    pub fn set(&mut self, data: &[u8]) -> Result<()> {
        self.set_with_usage(data, self.usage)
    }

    pub fn set_with_usage(&mut self, data: &[u8], usage: Usage) -> Result<()> {
        match plan_upload(self.size, self.usage, data.len(), usage) {
            Upload::Realloc => self.realloc(data, usage),
            Upload::SubData => self.sub_data(0, data),
        }
    }

    pub fn sub_data(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        if offset + data.len() > self.size {
            return Err(anyhow!(
                "sub_data {}..{} out of bounds for {} byte buffer",
                offset,
                offset + data.len(),
                self.size
            ));
        }
        let offset = gl_size(offset)?;
        unsafe {
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, Some(self.raw));
            self.gl
                .buffer_sub_data_u8_slice(glow::COPY_WRITE_BUFFER, offset, data);
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);
        }
        Ok(())
    }

    /// Immutable storage (`glBufferStorage`); later `set` calls that would
    /// reallocate fail.
    pub fn storage(&mut self, size: usize, data: Option<&[u8]>, flags: u32) -> Result<()> {
        if let Some(d) = data {
            if d.len() != size {
                return Err(anyhow!("storage data is {} bytes, expected {size}", d.len()));
            }
        }
        let gl_len = gl_size(size)?;
        unsafe {
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, Some(self.raw));
            self.gl
                .buffer_storage(glow::COPY_WRITE_BUFFER, gl_len, data, flags);
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);
        }
        self.size = size;
        self.immutable = true;
        Ok(())
    }

    /// Fills the whole buffer with `pattern`, one element already in the
    /// buffer's layout.
    pub fn clear(&mut self, pattern: &[u8]) -> Result<()> {
        self.clear_range(Range::new(0, self.size), pattern)
    }

    pub fn clear_range(&mut self, range: Range, pattern: &[u8]) -> Result<()> {
        if range.offset % pattern.len().max(1) != 0 {
            return Err(anyhow!("clear offset {} is not element aligned", range.offset));
        }
        let data = fill_pattern(pattern, range.size)?;
        self.sub_data(range.offset, &data)
    }

    pub fn get_sub_data(&self, range: Range) -> Result<Vec<u8>> {
        if range.offset + range.size > self.size {
            return Err(anyhow!("read-back range out of bounds"));
        }
        let offset = gl_size(range.offset)?;
        let mut data = vec![0; range.size];
        unsafe {
            self.gl.bind_buffer(glow::COPY_READ_BUFFER, Some(self.raw));
            self.gl
                .get_buffer_sub_data(glow::COPY_READ_BUFFER, offset, &mut data);
            self.gl.bind_buffer(glow::COPY_READ_BUFFER, None);
        }
        Ok(data)
    }

    /// Maps the whole store. See [`Buffer::map_range`].
    pub fn map(&mut self, access: u32) -> Result<Mapping<'_>> {
        self.map_range(Range::new(0, self.size), access)
    }

    /// Maps `range` with `glow::MAP_*` access bits. The buffer stays mapped
    /// while the returned [`Mapping`] lives.
    pub fn map_range(&mut self, range: Range, access: u32) -> Result<Mapping<'_>> {
        check_map(self.size, range, access)?;
        let (offset, length) = (gl_size(range.offset)?, gl_size(range.size)?);
        let ptr = unsafe {
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, Some(self.raw));
            let ptr = self
                .gl
                .map_buffer_range(glow::COPY_WRITE_BUFFER, offset, length, access);
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);
            ptr
        };
        if ptr.is_null() {
            return Err(anyhow!("glMapBufferRange returned null"));
        }
        Ok(Mapping {
            buffer: self,
            ptr,
            range,
            access,
        })
    }

    pub fn bind(&self, target: Target) {
        unsafe { self.gl.bind_buffer(target.raw(), Some(self.raw)) };
    }

    pub fn bind_base(&self, target: Target, index: u32) {
        unsafe { self.gl.bind_buffer_base(target.raw(), index, Some(self.raw)) };
    }

    pub fn bind_range(&self, target: Target, index: u32, range: Range) -> Result<()> {
        let offset = gl_size(range.offset)?;
        let size = gl_size(range.size)?;
        unsafe {
            self.gl
                .bind_buffer_range(target.raw(), index, Some(self.raw), offset, size)
        };
        Ok(())
    }

    /// Copies as many bytes as both buffers hold.
    pub fn copy_to(&self, destination: &Buffer) -> Result<()> {
        let size = self.size.min(destination.size);
        self.copy_range_to(destination, Range::new(0, size), 0)
    }

    pub fn copy_range_to(
        &self,
        destination: &Buffer,
        source: Range,
        destination_offset: usize,
    ) -> Result<()> {
        if source.offset + source.size > self.size
            || destination_offset + source.size > destination.size
        {
            return Err(anyhow!("buffer copy out of bounds"));
        }
        let (src_off, dst_off, size) = (
            gl_size(source.offset)?,
            gl_size(destination_offset)?,
            gl_size(source.size)?,
        );
        unsafe {
            self.gl.bind_buffer(glow::COPY_READ_BUFFER, Some(self.raw));
            self.gl
                .bind_buffer(glow::COPY_WRITE_BUFFER, Some(destination.raw));
            self.gl.copy_buffer_sub_data(
                glow::COPY_READ_BUFFER,
                glow::COPY_WRITE_BUFFER,
                src_off,
                dst_off,
                size,
            );
            self.gl.bind_buffer(glow::COPY_READ_BUFFER, None);
            self.gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);
        }
        Ok(())
    }
}

/// A mapped region of a [`Buffer`]; unmapped on drop.
pub struct Mapping<'a> {
    buffer: &'a mut Buffer,
    ptr: *mut u8,
    range: Range,
    access: u32,
}

impl Mapping<'_> {
    pub fn offset(&self) -> usize {
        self.range.offset
    }

    pub fn len(&self) -> usize {
        self.range.size
    }

    pub fn is_empty(&self) -> bool {
        self.range.size == 0
    }

    pub fn access(&self) -> u32 {
        self.access
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        (self.access & glow::MAP_READ_BIT != 0)
            .then(|| unsafe { std::slice::from_raw_parts(self.ptr, self.range.size) })
    }

    pub fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        (self.access & glow::MAP_WRITE_BIT != 0)
            .then(|| unsafe { std::slice::from_raw_parts_mut(self.ptr, self.range.size) })
    }

    /// Flushes `range`, relative to the start of the mapping. Needs
    /// `MAP_FLUSH_EXPLICIT_BIT`.
    pub fn flush(&self, range: Range) -> Result<()> {
        if self.access & glow::MAP_FLUSH_EXPLICIT_BIT == 0 {
            return Err(anyhow!("mapping was not created for explicit flushing"));
        }
        if range.offset + range.size > self.range.size {
            return Err(anyhow!("flush range outside the mapping"));
        }
        let (offset, size) = (gl_size(range.offset)?, gl_size(range.size)?);
        let gl = &self.buffer.gl;
        unsafe {
            gl.bind_buffer(glow::COPY_WRITE_BUFFER, Some(self.buffer.raw));
            gl.flush_mapped_buffer_range(glow::COPY_WRITE_BUFFER, offset, size);
            gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);
        }
        Ok(())
    }
}

impl Drop for Mapping<'_> {
    fn drop(&mut self) {
        let gl = &self.buffer.gl;
        unsafe {
            gl.bind_buffer(glow::COPY_WRITE_BUFFER, Some(self.buffer.raw));
            gl.unmap_buffer(glow::COPY_WRITE_BUFFER);
            gl.bind_buffer(glow::COPY_WRITE_BUFFER, None);
        }
    }
}

impl Drop for Buffer {
    fn drop(&mut self) {
        unsafe { self.gl.delete_buffer(self.raw) };
    }
}
