//! Screen capture boundary.

use crate::geometry::Rectangle;
use crate::util::TriggerResult;
use ::image::DynamicImage;

/// Source of fresh screen pixels for one monitor region.
///
/// Implementations must return newly grabbed pixels on every call; the
/// detection loop relies on this to observe screen changes between attempts.
/// A rectangle overhanging the monitor is clipped, so pixel `(0, 0)` of the
/// returned image sits at [`Rectangle::visible_origin`].
pub trait ScreenCapture {
    fn capture(&mut self, monitor_index: usize, rect: Rectangle) -> TriggerResult<DynamicImage>;
}

impl<C: ScreenCapture + ?Sized> ScreenCapture for Box<C> {
    fn capture(&mut self, monitor_index: usize, rect: Rectangle) -> TriggerResult<DynamicImage> {
        (**self).capture(monitor_index, rect)
    }
}

/// Captures through the platform compositor with `xcap`.
///
/// The whole monitor is grabbed and the rectangle cropped out of it, clipped
/// to the monitor bounds.
#[cfg(feature = "desktop")]
#[derive(Debug, Default, Clone, Copy)]
pub struct XcapCapture;

#[cfg(feature = "desktop")]
impl XcapCapture {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "desktop")]
impl ScreenCapture for XcapCapture {
    fn capture(&mut self, monitor_index: usize, rect: Rectangle) -> TriggerResult<DynamicImage> {
        use crate::util::TriggerError;

        let monitors = xcap::Monitor::all().map_err(|e| TriggerError::Capture(e.to_string()))?;
        let count = monitors.len();
        let monitor = monitors
            .into_iter()
            .nth(monitor_index)
            .ok_or(TriggerError::MonitorOutOfRange {
                index: monitor_index,
                count,
            })?;
        let frame = monitor
            .capture_image()
            .map_err(|e| TriggerError::Capture(e.to_string()))?;
        crop_region(&DynamicImage::ImageRgba8(frame), rect)
    }
}

/// Crops `rect` out of a full-monitor frame, clipped to the frame.
pub fn crop_region(frame: &DynamicImage, rect: Rectangle) -> TriggerResult<DynamicImage> {
    use crate::util::TriggerError;

    let (x, y, width, height) = rect
        .clip_to(frame.width(), frame.height())
        .ok_or(TriggerError::RegionOutOfBounds)?;
    Ok(frame.crop_imm(x, y, width, height))
}
