//! Display capture through xcap.

use std::time::Instant;

use bytes::Bytes;
use image::RgbaImage;
use replay_ipc::{Region, Resolution};
use tracing::{debug, info, instrument, trace};
use xcap::Monitor;

use crate::error::CaptureError;
use crate::frame::{CaptureTimestamp, RawFrame};
use crate::monitor::{open_monitor, MonitorInfo};
use crate::{CaptureResult, FrameSource};

/// Captures a fixed region of one monitor.
pub struct ScreenSource {
    monitor: Option<Monitor>,
    info: MonitorInfo,
    region: Region,
    sequence: u64,
    start_time: Instant,
}

impl ScreenSource {
    /// Open a monitor (primary when `monitor_index` is None) and fix the capture region.
    ///
    /// `region` is relative to the monitor; None captures the whole monitor.
    #[instrument(name = "screen_source_open", skip_all, fields(monitor = ?monitor_index))]
    pub fn open(monitor_index: Option<usize>, region: Option<Region>) -> CaptureResult<Self> {
        let (info, monitor) = open_monitor(monitor_index)?;
        let region = region.unwrap_or_else(|| Region::full(info.resolution));

        if !region.fits_within(info.resolution) {
            return Err(CaptureError::RegionOutOfBounds {
                region,
                bounds: info.resolution,
            });
        }

        info!(monitor = %info, ?region, "Screen source opened");

        Ok(Self {
            monitor: Some(monitor),
            info,
            region,
            sequence: 0,
            start_time: Instant::now(),
        })
    }

    /// The monitor this source captures from.
    pub fn monitor(&self) -> &MonitorInfo {
        &self.info
    }
}

impl FrameSource for ScreenSource {
    fn grab(&mut self) -> CaptureResult<RawFrame> {
        let monitor = self.monitor.as_ref().ok_or(CaptureError::Closed)?;
        let image = monitor.capture_image()?;
        let actual = Resolution::new(image.width(), image.height());

        if !self.region.fits_within(actual) {
            return Err(CaptureError::DimensionMismatch {
                expected: self.info.resolution,
                actual,
            });
        }

        let data = crop_to_rgb(&image, self.region);
        let timestamp = CaptureTimestamp::now(self.start_time);
        let sequence = self.sequence;
        self.sequence += 1;

        trace!(sequence, "Captured screen frame");

        Ok(RawFrame::new(
            Bytes::from(data),
            self.region.width,
            self.region.height,
            timestamp,
            sequence,
        ))
    }

    fn region(&self) -> Region {
        self.region
    }

    fn name(&self) -> String {
        self.info.to_string()
    }

    fn close(&mut self) -> CaptureResult<()> {
        if self.monitor.take().is_some() {
            debug!(frames = self.sequence, "Screen source closed");
        }
        Ok(())
    }
}

impl Drop for ScreenSource {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Cut `region` out of an RGBA image and repack it as RGB8.
///
/// The caller guarantees the region lies within the image.
fn crop_to_rgb(image: &RgbaImage, region: Region) -> Vec<u8> {
    let stride = image.width() as usize * 4;
    let rgba = image.as_raw();
    let w = region.width as usize;
    let mut rgb = Vec::with_capacity(RawFrame::rgb_buffer_size(region.width, region.height));

    for y in 0..region.height as usize {
        let row_start = (region.top as usize + y) * stride + region.left as usize * 4;
        let row = &rgba[row_start..row_start + w * 4];
        for px in row.chunks_exact(4) {
            rgb.extend_from_slice(&px[..3]);
        }
    }

    rgb
}
