// SPDX-License-Identifier: CEPL-1.0
//! Device feature request.
//!
//! Features are listed as tagged values and merged into owned feature blocks.
//! The pNext chain is only assembled on the stack of the call that consumes it,
//! so no block outlives or aliases another.

use ash::vk;

/// Core/versioned block a feature lives in.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeatureBlock {
    Core,
    Vulkan11,
    Vulkan12,
    Vulkan13,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Feature {
    FillModeNonSolid,
    GeometryShader,
    TessellationShader,
    WideLines,
    LargePoints,
    MultiDrawIndirect,
    DrawIndirectFirstInstance,
    VariablePointersStorageBuffer,
    VariablePointers,
    TimelineSemaphore,
    DynamicRendering,
    InlineUniformBlock,
    Synchronization2,
}

/// Everything the engine needs; device creation fails without any one of them.
pub const REQUIRED_FEATURES: &[Feature] = &[
    Feature::FillModeNonSolid,
    Feature::GeometryShader,
    Feature::TessellationShader,
    Feature::WideLines,
    Feature::LargePoints,
    Feature::MultiDrawIndirect,
    Feature::DrawIndirectFirstInstance,
    Feature::VariablePointersStorageBuffer,
    Feature::VariablePointers,
    Feature::TimelineSemaphore,
    Feature::DynamicRendering,
    Feature::InlineUniformBlock,
    Feature::Synchronization2,
];

impl Feature {
    pub fn block(self) -> FeatureBlock {
        use Feature::*;
        match self {
            FillModeNonSolid | GeometryShader | TessellationShader | WideLines | LargePoints
            | MultiDrawIndirect | DrawIndirectFirstInstance => FeatureBlock::Core,
            VariablePointersStorageBuffer | VariablePointers => FeatureBlock::Vulkan11,
            TimelineSemaphore => FeatureBlock::Vulkan12,
            DynamicRendering | InlineUniformBlock | Synchronization2 => FeatureBlock::Vulkan13,
        }
    }

    pub fn name(self) -> &'static str {
        use Feature::*;
        match self {
            FillModeNonSolid => "fillModeNonSolid",
            GeometryShader => "geometryShader",
            TessellationShader => "tessellationShader",
            WideLines => "wideLines",
            LargePoints => "largePoints",
            MultiDrawIndirect => "multiDrawIndirect",
            DrawIndirectFirstInstance => "drawIndirectFirstInstance",
            VariablePointersStorageBuffer => "variablePointersStorageBuffer",
            VariablePointers => "variablePointers",
            TimelineSemaphore => "timelineSemaphore",
            DynamicRendering => "dynamicRendering",
            InlineUniformBlock => "inlineUniformBlock",
            Synchronization2 => "synchronization2",
        }
    }
}

/// Unchained feature blocks; `p_next` is always null here.
#[derive(Clone, Copy, Debug, Default)]
pub struct FeatureBlocks {
    pub core: vk::PhysicalDeviceFeatures,
    pub v11: vk::PhysicalDeviceVulkan11Features<'static>,
    pub v12: vk::PhysicalDeviceVulkan12Features<'static>,
    pub v13: vk::PhysicalDeviceVulkan13Features<'static>,
}

impl FeatureBlocks {
    fn slot(&mut self, feature: Feature) -> &mut vk::Bool32 {
        use Feature::*;
        match feature {
            FillModeNonSolid => &mut self.core.fill_mode_non_solid,
            GeometryShader => &mut self.core.geometry_shader,
            TessellationShader => &mut self.core.tessellation_shader,
            WideLines => &mut self.core.wide_lines,
            LargePoints => &mut self.core.large_points,
            MultiDrawIndirect => &mut self.core.multi_draw_indirect,
            DrawIndirectFirstInstance => &mut self.core.draw_indirect_first_instance,
            VariablePointersStorageBuffer => &mut self.v11.variable_pointers_storage_buffer,
            VariablePointers => &mut self.v11.variable_pointers,
            TimelineSemaphore => &mut self.v12.timeline_semaphore,
            DynamicRendering => &mut self.v13.dynamic_rendering,
            InlineUniformBlock => &mut self.v13.inline_uniform_block,
            Synchronization2 => &mut self.v13.synchronization2,
        }
    }

    pub fn enable(&mut self, feature: Feature) {
        *self.slot(feature) = vk::TRUE;
    }

    pub fn is_enabled(&self, feature: Feature) -> bool {
        let mut probe = *self;
        *probe.slot(feature) == vk::TRUE
    }

    /// Clears chain pointers left behind by a driver query.
    pub fn unchained(mut self) -> Self {
        self.v11.p_next = std::ptr::null_mut();
        self.v12.p_next = std::ptr::null_mut();
        self.v13.p_next = std::ptr::null_mut();
        self
    }
}

#[derive(Clone, Debug)]
pub struct FeatureRequest {
    features: Vec<Feature>,
    blocks: FeatureBlocks,
}

impl FeatureRequest {
    pub fn new(features: &[Feature]) -> Self {
        let mut blocks = FeatureBlocks::default();
        for &f in features {
            blocks.enable(f);
        }
        Self {
            features: features.to_vec(),
            blocks,
        }
    }

    pub fn required() -> Self {
        Self::new(REQUIRED_FEATURES)
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn blocks(&self) -> FeatureBlocks {
        self.blocks
    }

    pub fn missing_from(&self, supported: &FeatureBlocks) -> Vec<Feature> {
        self.features
            .iter()
            .copied()
            .filter(|&f| !supported.is_enabled(f))
            .collect()
    }
}
