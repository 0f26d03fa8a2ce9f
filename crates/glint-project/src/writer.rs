//! Device writer: moves finished frames from the shared block to hardware.

use std::path::PathBuf;

use crossbeam_channel::{Receiver, Sender};
use glint_config::{DeviceConfig, DeviceKind};
use glint_core::OutputSize;
use glint_io::{DeviceError, LedDevice, NullDevice, SharedFrame, VirtualDevice, VirtualHandle};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::{Reply, WriterMessage};

/// Everything a device writer needs to start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriterSpec {
    /// Device to open.
    pub device: DeviceConfig,
    /// Shared frame block created by the orchestrator.
    pub frame_path: PathBuf,
}

impl WriterSpec {
    /// Child name used in logs and errors.
    pub fn child_name(&self) -> String {
        format!("writer:{}", self.device.id)
    }
}

/// Open the device described by `config` at its configured brightness.
///
/// Virtual devices also return a handle for reading back what they show.
pub fn open_device(config: &DeviceConfig) -> (Box<dyn LedDevice>, Option<VirtualHandle>) {
    let mut handle = None;
    let mut device: Box<dyn LedDevice> = match config.kind {
        DeviceKind::Null => Box::new(NullDevice::new(config.num_pixels, config.num_rows)),
        DeviceKind::Virtual => {
            let device = VirtualDevice::new(config.num_pixels, config.num_rows);
            handle = Some(device.handle());
            Box::new(device)
        }
    };
    device.set_brightness(config.brightness);
    (device, handle)
}

/// Run a writer until `Stop` arrives or the orchestrator hangs up.
pub fn run(
    spec: &WriterSpec,
    mut device: Box<dyn LedDevice>,
    inbox: Receiver<WriterMessage>,
    outbox: Sender<Reply>,
) -> Result<()> {
    let block = SharedFrame::open(&spec.frame_path)?;
    let expected = OutputSize::new(device.num_pixels(), device.num_rows());
    if block.size() != expected {
        return Err(DeviceError::Layout {
            expected,
            got: block.size(),
        }
        .into());
    }
    tracing::info!(device = %spec.device.id, "writer started");

    let mut shown = 0u64;
    for message in inbox.iter() {
        let reply = match message {
            WriterMessage::Probe { token } => Reply::ProbeAck { token },
            WriterMessage::Show { seq } => {
                match block.read() {
                    Ok(Some((stored, frame))) => {
                        if stored < seq {
                            tracing::debug!(device = %spec.device.id, seq, stored, "showing an older frame");
                        }
                        match device.show(&frame) {
                            Ok(()) => shown += 1,
                            Err(e) => tracing::warn!(device = %spec.device.id, seq, "show failed: {e}"),
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(device = %spec.device.id, seq, "frame read failed: {e}"),
                }
                Reply::Shown { seq }
            }
            WriterMessage::Brightness { value } => {
                device.set_brightness(value);
                tracing::debug!(device = %spec.device.id, brightness = device.brightness(), "brightness set");
                continue;
            }
            WriterMessage::Stop => break,
        };
        if outbox.send(reply).is_err() {
            break;
        }
    }
    tracing::info!(device = %spec.device.id, frames = shown, "writer stopped");
    Ok(())
}
