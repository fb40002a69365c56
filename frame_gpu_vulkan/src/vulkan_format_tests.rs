//! Unit tests for Vulkan format conversion functions
//!
//! Pure mapping functions, no GPU required.

use super::*;

// ============================================================================
// TEXTURE FORMAT CONVERSION TESTS
// ============================================================================

#[test]
fn test_texture_format_to_vk_unorm_formats() {
    assert_eq!(texture_format_to_vk(TextureFormat::R8Unorm), vk::Format::R8_UNORM);
    assert_eq!(texture_format_to_vk(TextureFormat::Rg8Unorm), vk::Format::R8G8_UNORM);
    assert_eq!(texture_format_to_vk(TextureFormat::Rgba8Unorm), vk::Format::R8G8B8A8_UNORM);
}

#[test]
fn test_texture_format_to_vk_srgb() {
    assert_eq!(texture_format_to_vk(TextureFormat::Rgba8Srgb), vk::Format::R8G8B8A8_SRGB);
}

#[test]
fn test_texture_format_to_vk_float_formats() {
    assert_eq!(texture_format_to_vk(TextureFormat::Rgba16Float), vk::Format::R16G16B16A16_SFLOAT);
    assert_eq!(texture_format_to_vk(TextureFormat::Rgba32Float), vk::Format::R32G32B32A32_SFLOAT);
}

// ============================================================================
// STAGING ALIGNMENT TESTS
// ============================================================================

#[test]
fn test_staging_alignment_at_least_four() {
    assert_eq!(staging_alignment(1, 1), 4);
    assert_eq!(staging_alignment(2, 1), 4);
}

#[test]
fn test_staging_alignment_uses_optimal_hint() {
    assert_eq!(staging_alignment(4, 256), 256);
    assert_eq!(staging_alignment(16, 64), 64);
}

#[test]
fn test_staging_alignment_multiple_of_texel_size() {
    assert_eq!(staging_alignment(16, 4), 16);
    assert_eq!(staging_alignment(8, 1), 8);
}

#[test]
fn test_staging_alignment_zero_hint() {
    assert_eq!(staging_alignment(4, 0), 4);
}
