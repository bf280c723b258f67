// SPDX-License-Identifier: CEPL-1.0
use glow::HasContext as _;

// GL 4.6 (ARB_gl_spirv) enums.
const SPIR_V_EXTENSIONS: u32 = 0x9553;
const NUM_SPIR_V_EXTENSIONS: u32 = 0x9554;

#[derive(Debug, Clone, Default)]
pub struct GlInfo {
    pub version: String,
    pub vendor: String,
    pub renderer: String,
    pub shading_language_version: String,
    pub extensions: Vec<String>,
    pub spirv_extensions: Vec<String>,
}

fn indexed_strings(gl: &glow::Context, count_name: u32, name: u32) -> Vec<String> {
    let count = unsafe { gl.get_parameter_i32(count_name) }.max(0) as u32;
    (0..count)
        .map(|i| unsafe { gl.get_parameter_indexed_string(name, i) })
        .collect()
}

/// SPIR-V extension strings only exist from GL 4.6 on.
pub fn supports_spirv_queries(major: u32, minor: u32, embedded: bool) -> bool {
    !embedded && (major, minor) >= (4, 6)
}

impl GlInfo {
    pub fn query(gl: &glow::Context) -> Self {
        let v = gl.version();
        let spirv_extensions = if supports_spirv_queries(v.major, v.minor, v.is_embedded) {
            indexed_strings(gl, NUM_SPIR_V_EXTENSIONS, SPIR_V_EXTENSIONS)
        } else {
            Vec::new()
        };

        unsafe {
            Self {
                version: gl.get_parameter_string(glow::VERSION),
                vendor: gl.get_parameter_string(glow::VENDOR),
                renderer: gl.get_parameter_string(glow::RENDERER),
                shading_language_version: gl.get_parameter_string(glow::SHADING_LANGUAGE_VERSION),
                extensions: indexed_strings(gl, glow::NUM_EXTENSIONS, glow::EXTENSIONS),
                spirv_extensions,
            }
        }
    }
}
