//! Pixel encoding, frame sizes and resolution negotiation.
//!
//! The capture pipeline always asks the device for Motion-JPEG so that
//! each dequeued buffer is already a self-contained compressed image
//! that can be uploaded as-is.

use std::fmt;
use std::str::FromStr;

/// Pixel encoding requested from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Motion-JPEG: every frame is a standalone JPEG image.
    Mjpeg,
}

impl PixelFormat {
    /// Returns the V4L2 four-character code.
    pub fn fourcc(self) -> [u8; 4] {
        match self {
            PixelFormat::Mjpeg => *b"MJPG",
        }
    }

    /// MIME type sent alongside frames in this encoding.
    pub fn content_type(self) -> &'static str {
        match self {
            PixelFormat::Mjpeg => "image/jpg",
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.fourcc();
        write!(f, "{}", String::from_utf8_lossy(&code))
    }
}

/// A width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Resolution {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Resolution {
    /// Creates a resolution.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel area, widened so large sensors cannot overflow.
    #[inline]
    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Error returned when a `WxH` string cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid resolution '{0}', expected WIDTHxHEIGHT")]
pub struct ParseResolutionError(String);

impl FromStr for Resolution {
    type Err = ParseResolutionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseResolutionError(s.to_string());
        let (width, height) = s
            .trim()
            .split_once(|c: char| c == 'x' || c == 'X')
            .ok_or_else(invalid)?;
        let width: u32 = width.trim().parse().map_err(|_| invalid())?;
        let height: u32 = height.trim().parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 {
            return Err(invalid());
        }
        Ok(Self { width, height })
    }
}

/// One frame size entry as reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSize {
    /// A specific natively supported size.
    Discrete(Resolution),
    /// A continuous or stepwise range. Never selected.
    Stepwise,
}

/// The format fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedFormat {
    /// Pixel encoding.
    pub pixel_format: PixelFormat,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
}

impl NegotiatedFormat {
    /// Returns the negotiated size.
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// Outcome of a frame size search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeSelection {
    /// The chosen size.
    pub resolution: Resolution,
    /// True when a requested size was found and chosen.
    pub exact_match: bool,
}

/// Picks a frame size from sizes in device-reported order.
///
/// A discrete size equal to `requested` wins immediately and stops the
/// search. Otherwise the largest area seen is kept, with a later entry
/// replacing an earlier one of equal area. Returns `None` when no
/// discrete size was offered at all.
pub fn select_frame_size<I>(sizes: I, requested: Option<Resolution>) -> Option<SizeSelection>
where
    I: IntoIterator<Item = FrameSize>,
{
    let mut best: Option<Resolution> = None;

    for size in sizes {
        let FrameSize::Discrete(candidate) = size else {
            continue;
        };

        if requested == Some(candidate) {
            return Some(SizeSelection {
                resolution: candidate,
                exact_match: true,
            });
        }

        if best.map_or(true, |b| candidate.area() >= b.area()) {
            best = Some(candidate);
        }
    }

    best.map(|resolution| SizeSelection {
        resolution,
        exact_match: false,
    })
}
