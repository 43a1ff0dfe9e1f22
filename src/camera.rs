// SPDX-License-Identifier: MPL-2.0
//! Viewport camera mapping between surface (canvas pixel) and content
//! (image pixel) coordinate spaces.
//!
//! One camera is owned by exactly one [`crate::layout::View`]. Pan and
//! zoom gestures mutate it directly; auto-fit operations reset it.

use crate::config::defaults::DEFAULT_MAX_SCALE;

/// Content must stay at least this many surface pixels inside the viewport
/// when scrolling.
pub const CONTENT_VISIBILITY_MARGIN: f64 = 20.0;

/// A 2D point. The coordinate space (surface vs. content) is determined
/// by the camera method that produced or consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl std::ops::Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f64> for Point {
    type Output = Point;

    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

/// Viewport camera: surface size, zoom scale and pixel offset.
///
/// The mapping is `surface = content * scale - offset`.
#[derive(Debug, Clone)]
pub struct Camera {
    /// Viewport width in surface pixels.
    pub width: f64,
    /// Viewport height in surface pixels.
    pub height: f64,
    /// Bound content dimensions in content pixels.
    pub content_width: f64,
    pub content_height: f64,
    scale: f64,
    offset: Point,
    max_scale: f64,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            width: 1.0,
            height: 1.0,
            content_width: 1.0,
            content_height: 1.0,
            scale: 1.0,
            offset: Point::default(),
            max_scale: DEFAULT_MAX_SCALE,
        }
    }
}

impl Camera {
    pub fn new(max_scale: f64) -> Self {
        Self {
            max_scale,
            ..Self::default()
        }
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn offset(&self) -> Point {
        self.offset
    }

    pub fn set_offset(&mut self, offset: Point) {
        self.offset = offset;
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.width = width.max(1.0);
        self.height = height.max(1.0);
    }

    /// Binds new content dimensions, optionally resetting to a fitted view.
    pub fn set_content_size(&mut self, width: f64, height: f64, reset_zoom: bool) {
        self.content_width = width.max(1.0);
        self.content_height = height.max(1.0);
        if reset_zoom {
            self.scale_to_fit();
        }
    }

    /// Smallest zoom the user can reach: half the fitted scale.
    pub fn min_zoom(&self) -> f64 {
        let h_ratio = self.height / self.content_height;
        let w_ratio = self.width / self.content_width;
        h_ratio.min(w_ratio) / 2.0
    }

    pub fn scale_to_fit_value(&self) -> f64 {
        let h_ratio = self.height / self.content_height;
        let w_ratio = self.width / self.content_width;
        h_ratio.min(w_ratio)
    }

    /// Fits the content into the viewport, centered horizontally.
    pub fn scale_to_fit(&mut self) {
        self.scale = self.scale_to_fit_value();
        let x_border = self.width - self.content_width * self.scale;
        self.offset = Point::new(-x_border / 2.0, 0.0);
    }

    pub fn surface_to_content(&self, point: Point) -> Point {
        Point::new(
            (point.x + self.offset.x) / self.scale,
            (point.y + self.offset.y) / self.scale,
        )
    }

    pub fn content_to_surface(&self, point: Point) -> Point {
        Point::new(
            point.x * self.scale - self.offset.x,
            point.y * self.scale - self.offset.y,
        )
    }

    pub fn zoom(&mut self, magnification: f64, anchor: Point) {
        if magnification > 1.0 {
            self.zoom_in(anchor, magnification);
        } else if magnification > 0.0 {
            self.zoom_out(anchor, 1.0 / magnification);
        }
    }

    /// Zooms in about `anchor` (surface space), keeping the content point
    /// under the anchor stationary.
    pub fn zoom_in(&mut self, anchor: Point, magnification: f64) {
        let src = self.surface_to_content(anchor);
        self.scale = (self.scale * magnification).min(self.max_scale);
        self.offset = src * self.scale - anchor;
    }

    pub fn zoom_out(&mut self, anchor: Point, magnification: f64) {
        let src = self.surface_to_content(anchor);
        self.scale = (self.scale / magnification).max(self.min_zoom());
        self.offset = src * self.scale - anchor;
    }

    /// Zooms so the surface-space rectangle spanned by `p1`/`p2` fills the
    /// viewport.
    pub fn zoom_to_box(&mut self, p1: Point, p2: Point) {
        let src_start = self.surface_to_content(p1);
        let src_end = self.surface_to_content(p2);

        let nw = (src_end.x - src_start.x).abs();
        let nh = (src_end.y - src_start.y).abs();
        if nw == 0.0 || nh == 0.0 {
            return;
        }

        let (w, h) = (self.width, self.height);
        self.scale = if w / h < nw / nh {
            (w / nw).min(self.max_scale)
        } else {
            (h / nh).min(self.max_scale)
        };

        let rect_start = Point::new(src_start.x.min(src_end.x), src_start.y.min(src_end.y))
            * self.scale;
        let rect_end =
            Point::new(src_start.x.max(src_end.x), src_start.y.max(src_end.y)) * self.scale;
        let viewport_end = rect_start + Point::new(w, h);
        self.offset = rect_start - (viewport_end - rect_end) * 0.5;
    }

    /// Pans by `delta` surface pixels, clamped so the content keeps at
    /// least [`CONTENT_VISIBILITY_MARGIN`] pixels inside the viewport.
    pub fn scroll(&mut self, delta: Point, scaling_factor: f64) {
        let delta = delta * (1.0 / scaling_factor.max(1.0));
        let mut offset = self.offset + delta;

        let max_horizontal = self.content_width * self.scale - CONTENT_VISIBILITY_MARGIN;
        let min_horizontal = -self.width + CONTENT_VISIBILITY_MARGIN;
        let max_vertical = self.content_height * self.scale - CONTENT_VISIBILITY_MARGIN;
        let min_vertical = -self.height + CONTENT_VISIBILITY_MARGIN;

        offset.x = offset.x.clamp(min_horizontal, max_horizontal.max(min_horizontal));
        offset.y = offset.y.clamp(min_vertical, max_vertical.max(min_vertical));
        self.offset = offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_100x100_content_200() -> Camera {
        let mut camera = Camera::default();
        camera.set_viewport(100.0, 100.0);
        camera.set_content_size(200.0, 200.0, true);
        camera
    }

    #[test]
    fn scale_to_fit_centers_content() {
        let camera = camera_100x100_content_200();
        assert_eq!(camera.scale(), 0.5);
        assert_eq!(camera.offset(), Point::new(0.0, 0.0));
    }

    #[test]
    fn surface_content_round_trip() {
        let mut camera = camera_100x100_content_200();
        camera.set_offset(Point::new(13.0, -4.0));
        let surface = Point::new(42.0, 17.0);
        let back = camera.content_to_surface(camera.surface_to_content(surface));
        assert!((back.x - surface.x).abs() < 1e-9);
        assert!((back.y - surface.y).abs() < 1e-9);
    }

    #[test]
    fn zoom_in_keeps_anchor_stationary() {
        let mut camera = camera_100x100_content_200();
        let anchor = Point::new(30.0, 70.0);
        let before = camera.surface_to_content(anchor);
        camera.zoom_in(anchor, 1.25);
        let after = camera.surface_to_content(anchor);
        assert!((before.x - after.x).abs() < 1e-9);
        assert!((before.y - after.y).abs() < 1e-9);
    }

    #[test]
    fn zoom_in_clamps_to_max_scale() {
        let mut camera = Camera::new(2.0);
        camera.set_viewport(100.0, 100.0);
        camera.set_content_size(100.0, 100.0, true);
        for _ in 0..20 {
            camera.zoom_in(Point::new(50.0, 50.0), 1.5);
        }
        assert_eq!(camera.scale(), 2.0);
    }

    #[test]
    fn zoom_out_clamps_to_min_zoom() {
        let mut camera = camera_100x100_content_200();
        for _ in 0..20 {
            camera.zoom_out(Point::new(50.0, 50.0), 1.5);
        }
        assert_eq!(camera.scale(), camera.min_zoom());
    }

    #[test]
    fn scroll_clamps_to_visibility_margin() {
        let mut camera = camera_100x100_content_200();
        camera.scroll(Point::new(1e6, 1e6), 1.0);
        let max_expected = camera.content_width * camera.scale() - CONTENT_VISIBILITY_MARGIN;
        assert_eq!(camera.offset().x, max_expected);

        camera.scroll(Point::new(-1e6, -1e6), 1.0);
        assert_eq!(camera.offset().x, -camera.width + CONTENT_VISIBILITY_MARGIN);
    }

    #[test]
    fn zoom_to_box_fills_viewport_with_box() {
        let mut camera = camera_100x100_content_200();
        camera.zoom_to_box(Point::new(10.0, 10.0), Point::new(60.0, 60.0));
        // A 50x50 surface box at scale 0.5 covers 100x100 content pixels,
        // so the viewport (100x100) now shows them at scale 1.
        assert!((camera.scale() - 1.0).abs() < 1e-9);
    }
}
