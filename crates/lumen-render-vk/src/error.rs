// SPDX-License-Identifier: CEPL-1.0
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// No queue family offers graphics + compute + presentation.
    #[error("no queue family supports graphics, compute and presentation")]
    NoSuitableQueueFamily,

    #[error("no Vulkan physical device found")]
    NoPhysicalDeviceFound,

    #[error("instance creation failed: {0}")]
    InstanceCreationFailed(String),

    #[error("logical device creation failed: {0}")]
    DeviceCreationFailed(String),

    #[error("surface creation failed: {0}")]
    SurfaceCreationFailed(String),

    /// The only condition worth retrying, on the next resize/restore event.
    #[error("swapchain creation failed: {0}")]
    SwapchainCreationFailed(String),
}

impl Error {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::SwapchainCreationFailed(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_swapchain_failures_are_recoverable() {
        assert!(Error::SwapchainCreationFailed("out of date".into()).is_recoverable());
        assert!(!Error::NoSuitableQueueFamily.is_recoverable());
        assert!(!Error::NoPhysicalDeviceFound.is_recoverable());
        assert!(!Error::InstanceCreationFailed("x".into()).is_recoverable());
        assert!(!Error::DeviceCreationFailed("x".into()).is_recoverable());
        assert!(!Error::SurfaceCreationFailed("x".into()).is_recoverable());
    }
}
