pub mod config;
mod shaders;
#[cfg(test)]
pub(crate) mod software;
pub mod vulkan;

pub use vulkan::VulkanBackend;
