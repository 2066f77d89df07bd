//! Viewport compositor: where the video content lands on screen and how the
//! camera projection must be adjusted to stay registered with it.
//!
//! # Pixel Frame
//! ```text
//!   (0, screen_height)          (screen_width, screen_height)
//!         +-----------------------------+
//!         |                             |
//!         |      +-------------+        |
//!         |      |   content   | h      |
//!         |      +-------------+        |
//!         |   (x, y)    w               |
//!         +-----------------------------+
//!   (0, 0)                      (screen_width, 0)
//! ```
//! Origin bottom-left, as the host camera's pixel rectangle expects.
//!
//! Everything here is a pure function of a [`ViewportRequest`]. There is no
//! cached state, so it can be called from any thread.

pub mod projection;

use std::fmt;

use nalgebra::Matrix4;
use serde::Deserialize;
use tracing::debug;

pub use projection::{adjust_projection, orientation_rotation, perspective};

/// How video content is fitted to the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentMode {
    /// Fill the screen, ignoring aspect ratio.
    Stretch,
    /// Largest size that fits entirely; may letterbox.
    #[default]
    Fit,
    /// Smallest size that covers the screen; may overflow.
    Fill,
    /// Source pixels map 1:1 to screen pixels.
    OneToOne,
}

impl ContentMode {
    /// Next mode in the user-facing cycle Fit, Fill, Stretch, 1:1.
    pub fn next(self) -> Self {
        match self {
            Self::Fit => Self::Fill,
            Self::Fill => Self::Stretch,
            Self::Stretch => Self::OneToOne,
            Self::OneToOne => Self::Fit,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Stretch => "Stretch",
            Self::Fit => "Fit",
            Self::Fill => "Fill",
            Self::OneToOne => "1:1",
        }
    }
}

impl fmt::Display for ContentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Placement along one screen axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// Left or bottom.
    Near,
    Center,
    /// Right or top.
    Far,
}

/// Where content smaller or larger than the screen is anchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentAlign {
    TopLeft,
    Top,
    TopRight,
    Left,
    #[default]
    Center,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl ContentAlign {
    pub fn horizontal(self) -> Anchor {
        match self {
            Self::TopLeft | Self::Left | Self::BottomLeft => Anchor::Near,
            Self::TopRight | Self::Right | Self::BottomRight => Anchor::Far,
            Self::Top | Self::Center | Self::Bottom => Anchor::Center,
        }
    }

    pub fn vertical(self) -> Anchor {
        match self {
            Self::BottomLeft | Self::Bottom | Self::BottomRight => Anchor::Near,
            Self::TopLeft | Self::Top | Self::TopRight => Anchor::Far,
            Self::Left | Self::Center | Self::Right => Anchor::Center,
        }
    }
}

/// Which half of a side-by-side stereo display a camera renders to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StereoEye {
    #[default]
    None,
    Left,
    Right,
}

/// Physical orientation of a handheld device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenOrientation {
    /// Natural landscape; no correction.
    #[default]
    LandscapeLeft,
    LandscapeRight,
    Portrait,
    PortraitUpsideDown,
}

impl ScreenOrientation {
    /// Portrait devices show landscape video with swapped axes.
    pub fn is_portrait(self) -> bool {
        matches!(self, Self::Portrait | Self::PortraitUpsideDown)
    }
}

/// Pixel rectangle, origin bottom-left. Origins may be negative under Fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewportRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl ViewportRect {
    pub const EMPTY: Self = Self {
        x: 0,
        y: 0,
        width: 0,
        height: 0,
    };

    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn aspect(&self) -> Option<f64> {
        (!self.is_empty()).then(|| f64::from(self.width) / f64::from(self.height))
    }
}

impl fmt::Display for ViewportRect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} at ({}, {})", self.width, self.height, self.x, self.y)
    }
}

/// Inputs for one logical camera for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewportRequest {
    pub content_mode: ContentMode,
    pub content_align: ContentAlign,
    pub rotate90: bool,
    pub flip_h: bool,
    pub flip_v: bool,
    pub source_width: u32,
    pub source_height: u32,
    pub screen_width: u32,
    pub screen_height: u32,
    pub stereo: StereoEye,
    pub orientation: ScreenOrientation,
    /// Projection for the video source before content adjustments.
    pub base_projection: Matrix4<f64>,
}

impl ViewportRequest {
    /// Request with default policy (Fit, centered, no flips, mono).
    pub fn new(source_width: u32, source_height: u32, screen_width: u32, screen_height: u32) -> Self {
        Self {
            content_mode: ContentMode::default(),
            content_align: ContentAlign::default(),
            rotate90: false,
            flip_h: false,
            flip_v: false,
            source_width,
            source_height,
            screen_width,
            screen_height,
            stereo: StereoEye::None,
            orientation: ScreenOrientation::default(),
            base_projection: Matrix4::identity(),
        }
    }

    /// Content size after rotation and device orientation.
    fn content_size(&self) -> (u32, u32) {
        // A portrait device and a 90° content rotation each swap the axes.
        if self.rotate90 != self.orientation.is_portrait() {
            (self.source_height, self.source_width)
        } else {
            (self.source_width, self.source_height)
        }
    }

    fn is_degenerate(&self) -> bool {
        self.source_width == 0
            || self.source_height == 0
            || self.screen_width == 0
            || self.screen_height == 0
    }
}

/// Computed placement for one camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub rect: ViewportRect,
    pub projection: Matrix4<f64>,
}

impl Viewport {
    pub fn empty() -> Self {
        Self {
            rect: ViewportRect::EMPTY,
            projection: Matrix4::identity(),
        }
    }
}

/// Scale `(cw, ch)` into `(sw, sh)` keeping aspect ratio.
///
/// `cover` picks the larger of the two scale factors (Fill), otherwise the
/// smaller (Fit). Computed in integers so the limiting axis matches the
/// screen exactly and the other axis is truncated.
fn scale_to(cw: u32, ch: u32, sw: u32, sh: u32, cover: bool) -> (i32, i32) {
    let (cw, ch, sw, sh) = (u64::from(cw), u64::from(ch), u64::from(sw), u64::from(sh));
    // sw/cw <= sh/ch  <=>  sw*ch <= sh*cw
    let width_limited = sw * ch <= sh * cw;
    let (w, h) = if width_limited != cover {
        (sw, ch * sw / cw)
    } else {
        (cw * sh / ch, sh)
    };
    (clamp_i32(w), clamp_i32(h))
}

fn clamp_i32(v: u64) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

fn content_extent(request: &ViewportRequest, area_width: u32, area_height: u32) -> (i32, i32) {
    let (cw, ch) = request.content_size();
    match request.content_mode {
        ContentMode::Stretch => (clamp_i32(area_width.into()), clamp_i32(area_height.into())),
        ContentMode::Fit => scale_to(cw, ch, area_width, area_height, false),
        ContentMode::Fill => scale_to(cw, ch, area_width, area_height, true),
        ContentMode::OneToOne => (clamp_i32(cw.into()), clamp_i32(ch.into())),
    }
}

fn align(anchor: Anchor, available: i32, size: i32) -> i32 {
    match anchor {
        Anchor::Near => 0,
        Anchor::Far => available - size,
        Anchor::Center => (available - size) / 2,
    }
}

fn projection_for(request: &ViewportRequest) -> Matrix4<f64> {
    adjust_projection(
        &request.base_projection,
        request.rotate90,
        request.flip_h,
        request.flip_v,
        request.orientation,
    )
}

/// Viewport and projection for a single camera.
///
/// A request with `stereo` set is placed in that eye's half of the screen,
/// as [`compute_stereo`] does.
pub fn compute_mono(request: &ViewportRequest) -> Viewport {
    if request.is_degenerate() {
        return Viewport::empty();
    }
    if request.stereo != StereoEye::None {
        return compute_eye(request, request.stereo);
    }

    let sw = clamp_i32(request.screen_width.into());
    let sh = clamp_i32(request.screen_height.into());
    let (w, h) = content_extent(request, request.screen_width, request.screen_height);
    let rect = ViewportRect::new(
        align(request.content_align.horizontal(), sw, w),
        align(request.content_align.vertical(), sh, h),
        w,
        h,
    );
    debug!(
        "{} viewport for {}x{} screen: {}",
        request.content_mode, request.screen_width, request.screen_height, rect
    );

    Viewport {
        rect,
        projection: projection_for(request),
    }
}

/// Viewports for a side-by-side stereo pair.
///
/// Each eye gets half the screen width; content is fitted within the half
/// and placed at the half's origin. Alignment is ignored.
pub fn compute_stereo(left: &ViewportRequest, right: &ViewportRequest) -> (Viewport, Viewport) {
    let l = if left.is_degenerate() {
        Viewport::empty()
    } else {
        compute_eye(left, StereoEye::Left)
    };
    let r = if right.is_degenerate() {
        Viewport::empty()
    } else {
        compute_eye(right, StereoEye::Right)
    };
    (l, r)
}

fn compute_eye(request: &ViewportRequest, eye: StereoEye) -> Viewport {
    let half_width = request.screen_width / 2;
    if half_width == 0 {
        return Viewport::empty();
    }
    let x = match eye {
        StereoEye::Right => clamp_i32(half_width.into()),
        _ => 0,
    };
    let (w, h) = content_extent(request, half_width, request.screen_height);
    let rect = ViewportRect::new(x, 0, w, h);
    debug!("{:?} eye viewport: {}", eye, rect);

    Viewport {
        rect,
        projection: projection_for(request),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn request(mode: ContentMode) -> ViewportRequest {
        let mut r = ViewportRequest::new(1280, 720, 1000, 500);
        r.content_mode = mode;
        r
    }

    #[test]
    fn test_fit_letterboxes() {
        let vp = compute_mono(&request(ContentMode::Fit));

        assert_eq!(vp.rect.width, 888);
        assert_eq!(vp.rect.height, 500);
        assert!(vp.rect.width <= 1000 && vp.rect.height <= 500);
        assert_eq!(vp.rect.x, 56);
        assert_eq!(vp.rect.y, 0);
        assert_relative_eq!(vp.rect.aspect().unwrap(), 1280.0 / 720.0, epsilon = 2e-3);
    }

    #[test]
    fn test_fill_overflows() {
        let vp = compute_mono(&request(ContentMode::Fill));

        assert_eq!(vp.rect.width, 1000);
        assert_eq!(vp.rect.height, 562);
        assert!(vp.rect.width >= 1000 && vp.rect.height >= 500);
        assert_eq!(vp.rect.y, -31);
        assert_relative_eq!(vp.rect.aspect().unwrap(), 1280.0 / 720.0, epsilon = 2e-3);
    }

    #[test]
    fn test_stretch_and_one_to_one() {
        let vp = compute_mono(&request(ContentMode::Stretch));
        assert_eq!(vp.rect, ViewportRect::new(0, 0, 1000, 500));

        let vp = compute_mono(&request(ContentMode::OneToOne));
        assert_eq!(vp.rect, ViewportRect::new(-140, -110, 1280, 720));
    }

    #[test]
    fn test_alignment_anchors() {
        let mut r = request(ContentMode::Fit);
        r.content_align = ContentAlign::TopRight;
        assert_eq!(compute_mono(&r).rect, ViewportRect::new(112, 0, 888, 500));

        r.content_align = ContentAlign::BottomLeft;
        assert_eq!(compute_mono(&r).rect, ViewportRect::new(0, 0, 888, 500));

        let mut r = request(ContentMode::OneToOne);
        r.source_width = 400;
        r.source_height = 300;
        r.content_align = ContentAlign::Top;
        assert_eq!(compute_mono(&r).rect, ViewportRect::new(300, 200, 400, 300));
    }

    #[test]
    fn test_rotate90_swaps_content_axes() {
        let mut r = request(ContentMode::Fit);
        r.rotate90 = true;
        let vp = compute_mono(&r);

        // 720x1280 into 1000x500.
        assert_eq!(vp.rect.height, 500);
        assert_eq!(vp.rect.width, 281);
    }

    #[test]
    fn test_portrait_swaps_and_rotate_cancels() {
        let mut r = request(ContentMode::OneToOne);
        r.orientation = ScreenOrientation::Portrait;
        assert_eq!((compute_mono(&r).rect.width, compute_mono(&r).rect.height), (720, 1280));

        r.rotate90 = true;
        assert_eq!((compute_mono(&r).rect.width, compute_mono(&r).rect.height), (1280, 720));
    }

    #[test]
    fn test_stereo_partition() {
        let mut left = request(ContentMode::Stretch);
        left.stereo = StereoEye::Left;
        let mut right = left.clone();
        right.stereo = StereoEye::Right;

        let (l, r) = compute_stereo(&left, &right);
        assert!(l.rect.width <= 500 && l.rect.x >= 0);
        assert!(r.rect.x >= 500);
        assert_eq!(l.rect, ViewportRect::new(0, 0, 500, 500));
        assert_eq!(r.rect, ViewportRect::new(500, 0, 500, 500));

        assert_eq!(compute_mono(&right).rect, r.rect);
    }

    #[test]
    fn test_stereo_fit_within_half() {
        let left = request(ContentMode::Fit);
        let (l, r) = compute_stereo(&left, &left);

        assert_eq!(l.rect, ViewportRect::new(0, 0, 500, 281));
        assert_eq!(r.rect, ViewportRect::new(500, 0, 500, 281));
    }

    #[test]
    fn test_zero_dimensions_are_empty() {
        let mut r = request(ContentMode::Fit);
        r.source_width = 0;
        r.rotate90 = true;
        let vp = compute_mono(&r);
        assert!(vp.rect.is_empty());
        assert_eq!(vp.projection, Matrix4::identity());

        let mut r = request(ContentMode::Fill);
        r.screen_height = 0;
        assert_eq!(compute_mono(&r), Viewport::empty());

        let mut r = request(ContentMode::Stretch);
        r.screen_width = 1;
        let (l, right) = compute_stereo(&r, &r);
        assert!(l.rect.is_empty() && right.rect.is_empty());
    }

    #[test]
    fn test_projection_follows_flags() {
        let mut r = request(ContentMode::Fit);
        r.base_projection = perspective(45.0, 16.0 / 9.0, 0.01, 100.0);
        r.flip_v = true;
        let vp = compute_mono(&r);

        assert_relative_eq!(vp.projection[(1, 1)], -r.base_projection[(1, 1)], epsilon = 1e-12);
        assert_relative_eq!(vp.projection[(0, 0)], r.base_projection[(0, 0)], epsilon = 1e-12);
    }

    #[test]
    fn test_content_mode_cycle() {
        let mut mode = ContentMode::Fit;
        let mut seen = Vec::new();
        for _ in 0..4 {
            seen.push(mode.name());
            mode = mode.next();
        }
        assert_eq!(seen, ["Fit", "Fill", "Stretch", "1:1"]);
        assert_eq!(mode, ContentMode::Fit);
    }

    #[test]
    fn test_align_axes() {
        assert_eq!(ContentAlign::TopLeft.horizontal(), Anchor::Near);
        assert_eq!(ContentAlign::TopLeft.vertical(), Anchor::Far);
        assert_eq!(ContentAlign::Bottom.horizontal(), Anchor::Center);
        assert_eq!(ContentAlign::Right.vertical(), Anchor::Center);
    }
}
