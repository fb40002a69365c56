use super::*;

#[test]
fn test_default_values() {
    let config = GfxConfig::default();
    assert_eq!(config.frames_in_flight, 2);
    assert_eq!(config.min_cpu_visible_vram, 1_000_000);
    assert!(config.prefer_cpu_visible_vram);
    assert!(config.join_before_texture_flush);
    assert!(config.validate().is_ok());
}

#[test]
fn test_zero_frames_rejected() {
    let config = GfxConfig {
        frames_in_flight: 0,
        ..Default::default()
    };
    assert!(matches!(config.validate(), Err(Error::InitializationFailed(_))));
}

#[test]
fn test_zero_heap_rejected_with_name() {
    let config = GfxConfig {
        depth_stencil_heap_size: 0,
        ..Default::default()
    };
    match config.validate() {
        Err(Error::InitializationFailed(msg)) => assert!(msg.contains("depth_stencil_heap_size")),
        other => panic!("expected InitializationFailed, got {:?}", other),
    }
}

#[test]
fn test_single_frame_in_flight_is_valid() {
    let config = GfxConfig {
        frames_in_flight: 1,
        ..Default::default()
    };
    assert!(config.validate().is_ok());
}
