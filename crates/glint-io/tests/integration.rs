//! Integration tests for glint-io: a writer and a reader sharing a frame
//! block across threads, and a device fed from the block.

use std::thread;

use glint_core::{OutputSize, PixelBuffer};
use glint_io::{DeviceError, LedDevice, SharedFrame, VirtualDevice};
use tempfile::TempDir;

// ============================================================================
// Concurrent access
// ============================================================================

#[test]
fn test_reader_never_sees_mixed_frames() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("strip.frame");
    let size = OutputSize::new(256, 1);
    let _owner = SharedFrame::create(&path, size).unwrap();

    let writer_path = path.clone();
    let writer = thread::spawn(move || {
        let mut block = SharedFrame::open(writer_path).unwrap();
        for seq in 1..=300u64 {
            let level = (seq % 250) as f32;
            block.write(seq, &PixelBuffer::filled(size, [level; 3])).unwrap();
        }
    });

    let reader = SharedFrame::open(&path).unwrap();
    let mut last = 0;
    let mut check = |result: Result<Option<(u64, PixelBuffer)>, DeviceError>| match result {
        Ok(Some((seq, frame))) => {
            assert!(seq >= last, "sequence went backwards: {seq} < {last}");
            let first = frame.pixel(0).unwrap();
            assert!(
                (0..frame.len()).all(|i| frame.pixel(i) == Some(first)),
                "frame {seq} mixes two writes"
            );
            assert_eq!(first[0], (seq % 250) as f32);
            last = seq;
        }
        Ok(None) | Err(DeviceError::TornFrame) => {}
        Err(e) => panic!("unexpected read error: {e}"),
    };
    while !writer.is_finished() {
        check(reader.read());
    }
    writer.join().unwrap();
    check(reader.read());
    assert_eq!(last, 300);
}

// ============================================================================
// Block to device
// ============================================================================

#[test]
fn test_block_feeds_device() {
    let dir = TempDir::new().unwrap();
    let size = OutputSize::new(30, 3);
    let mut block = SharedFrame::create(dir.path().join("panel.frame"), size).unwrap();
    let mut device = VirtualDevice::new(30, 3);
    let preview = device.handle();
    device.set_brightness(0.5);

    block.write(7, &PixelBuffer::filled(size, [100.0, 50.0, 10.0])).unwrap();
    let (seq, frame) = block.read().unwrap().unwrap();
    device.show(&frame).unwrap();

    assert_eq!(seq, 7);
    let shown = preview.latest().unwrap();
    assert_eq!(shown.rows(), 3);
    assert_eq!(shown.pixel(29), Some([50.0, 25.0, 5.0]));
}
