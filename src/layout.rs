//! Pure geometry functions for the four layouts (section 4.3).
//!
//! Every function here is a pure function of its inputs: no client list,
//! no X connection. `workspace::Workspace::relayout` is the only caller -
//! it pulls the non-FFT clients out of its list, calls `arrange`, zips the
//! resulting rectangles back onto those clients, then runs the draw policy
//! and hands the result to `xconn::XConn` for the actual configure pass.

use crate::client::{Client, ClientFlags};

pub type Rect = (i32, i32, u32, u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutKind {
    Zoom,
    Grid,
    Hstack,
    Vstack,
}

impl Default for LayoutKind {
    fn default() -> Self {
        LayoutKind::Zoom
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ScreenGeometry {
    pub width: u32,
    pub height: u32,
    pub bar_height: u32,
    pub bar_on_top: bool,
    /// Margin reserved between the tiled region and the screen edges,
    /// distinct from the per-client gap `draw_policy` insets around each
    /// window's own border (section 4.8.1's `outer_gap`).
    pub outer_gap: u32,
}

impl ScreenGeometry {
    /// Screen area minus the bar reservation and the outer-gap margin.
    pub fn drawable(&self) -> Rect {
        let h = self.height.saturating_sub(self.bar_height);
        let (x, y, w, h) = if self.bar_on_top {
            (0, self.bar_height as i32, self.width, h)
        } else {
            (0, 0, self.width, h)
        };
        inset(x, y, w, h, self.outer_gap)
    }

    /// Full screen, ignoring the bar - used for fullscreen clients.
    pub fn full(&self) -> Rect {
        (0, 0, self.width, self.height)
    }
}

fn inset(x: i32, y: i32, w: u32, h: u32, margin: u32) -> Rect {
    (
        x + margin as i32,
        y + margin as i32,
        w.saturating_sub(2 * margin),
        h.saturating_sub(2 * margin),
    )
}

/// Compute a raw rectangle per non-FFT client, in list order. Falls back
/// to zoom whenever there is at most one tilable client, per section 4.3.
pub fn arrange(kind: LayoutKind, n: usize, screen: ScreenGeometry, master_ratio: f32) -> Vec<Rect> {
    if n == 0 {
        return Vec::new();
    }
    match kind {
        LayoutKind::Zoom => zoom(n, screen),
        LayoutKind::Grid => grid(n, screen),
        LayoutKind::Vstack if n > 1 => vstack(n, screen, master_ratio),
        LayoutKind::Hstack if n > 1 => hstack(n, screen, master_ratio),
        _ => zoom(n, screen),
    }
}

fn zoom(n: usize, screen: ScreenGeometry) -> Vec<Rect> {
    vec![screen.drawable(); n]
}

/// Smallest cols such that cols^2 >= n; rows = floor(n/cols); the last
/// `n % cols` columns carry one extra row to absorb the remainder.
/// Clients are assigned column-major.
fn grid(n: usize, screen: ScreenGeometry) -> Vec<Rect> {
    let (sx, sy, sw, sh) = screen.drawable();

    let mut cols = 1usize;
    while cols * cols < n {
        cols += 1;
    }
    let base_rows = n / cols;
    let extra = n % cols;

    let mut rows_per_col = vec![base_rows; cols];
    for c in (cols - extra)..cols {
        rows_per_col[c] += 1;
    }

    let col_w = sw / cols as u32;
    let mut rects = Vec::with_capacity(n);
    for c in 0..cols {
        let this_col_w = if c == cols - 1 {
            sw - col_w * (cols as u32 - 1)
        } else {
            col_w
        };
        let rows = rows_per_col[c];
        if rows == 0 {
            continue;
        }
        let row_h = sh / rows as u32;
        for r in 0..rows {
            let this_row_h = if r == rows - 1 {
                sh - row_h * (rows as u32 - 1)
            } else {
                row_h
            };
            let x = sx + (col_w * c as u32) as i32;
            let y = sy + (row_h * r as u32) as i32;
            rects.push((x, y, this_col_w, this_row_h));
        }
    }
    rects
}

/// Master on the left at `master_ratio` of the width, spanning the full
/// drawable height; the rest stack vertically in the remaining strip.
fn vstack(n: usize, screen: ScreenGeometry, master_ratio: f32) -> Vec<Rect> {
    let (sx, sy, sw, sh) = screen.drawable();
    let master_w = ((sw as f32) * master_ratio).round() as u32;
    let stack_w = sw.saturating_sub(master_w);

    let mut rects = Vec::with_capacity(n);
    rects.push((sx, sy, master_w, sh));

    let stack_n = n - 1;
    if stack_n > 0 {
        let each_h = sh / stack_n as u32;
        for i in 0..stack_n {
            let this_h = if i == stack_n - 1 {
                sh - each_h * (stack_n as u32 - 1)
            } else {
                each_h
            };
            let y = sy + (each_h * i as u32) as i32;
            rects.push((sx + master_w as i32, y, stack_w, this_h));
        }
    }
    rects
}

/// Symmetric with `vstack`: master on top.
fn hstack(n: usize, screen: ScreenGeometry, master_ratio: f32) -> Vec<Rect> {
    let (sx, sy, sw, sh) = screen.drawable();
    let master_h = ((sh as f32) * master_ratio).round() as u32;
    let stack_h = sh.saturating_sub(master_h);

    let mut rects = Vec::with_capacity(n);
    rects.push((sx, sy, sw, master_h));

    let stack_n = n - 1;
    if stack_n > 0 {
        let each_w = sw / stack_n as u32;
        for i in 0..stack_n {
            let this_w = if i == stack_n - 1 {
                sw - each_w * (stack_n as u32 - 1)
            } else {
                each_w
            };
            let x = sx + (each_w * i as u32) as i32;
            rects.push((x, sy + master_h as i32, this_w, stack_h));
        }
    }
    rects
}

/// Final (x, y, w, h, border_width) to configure a client with, given its
/// raw layout rectangle (or its own stored geometry if floating).
///
/// - zoom with zoom-gap disabled, or fullscreen: zero border, full rect.
/// - floating: configured border, client's own stored geometry.
/// - otherwise: inset by gap on every side, with the border width doubly
///   counted (a gap sits around the border).
///
/// Negative configured gap saturates at zero; a fullscreen client's gap is
/// forced to zero regardless of configuration.
pub fn draw_policy(
    client: &Client,
    raw_rect: Rect,
    layout: LayoutKind,
    zoom_gap: bool,
    screen: ScreenGeometry,
    border_width: u32,
    gap: i32,
) -> (i32, i32, u32, u32, u32) {
    if client.flags.contains(ClientFlags::FULLSCREEN) {
        let (x, y, w, h) = screen.full();
        return (x, y, w, h, 0);
    }

    if layout == LayoutKind::Zoom && !zoom_gap {
        let (x, y, w, h) = raw_rect;
        return (x, y, w, h, 0);
    }

    if client.flags.contains(ClientFlags::FLOATING) {
        return (client.x, client.y, client.w, client.h, border_width);
    }

    let gap = gap.max(0) as u32;
    let (x, y, w, h) = raw_rect;
    let inset = gap + border_width;
    let w = w.saturating_sub(2 * inset);
    let h = h.saturating_sub(2 * inset);
    (x + inset as i32, y + inset as i32, w, h, border_width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_test::{assert_tokens, Token};

    /// `LayoutKind` round-trips through the lowercase `toml` representation
    /// `config::ArrangementSettings`/`RuleSettings` would write, e.g.
    /// `layout = "vstack"` (section 4.8.1's config schema).
    #[test]
    fn layout_kind_serializes_lowercase() {
        assert_tokens(&LayoutKind::Vstack, &[Token::UnitVariant { name: "LayoutKind", variant: "vstack" }]);
        assert_tokens(&LayoutKind::Zoom, &[Token::UnitVariant { name: "LayoutKind", variant: "zoom" }]);
    }

    fn screen() -> ScreenGeometry {
        ScreenGeometry {
            width: 1920,
            height: 1080,
            bar_height: 20,
            bar_on_top: true,
            outer_gap: 0,
        }
    }

    #[test]
    fn zoom_gives_full_drawable_area_to_every_client() {
        let rects = arrange(LayoutKind::Zoom, 3, screen(), 0.5);
        assert_eq!(rects.len(), 3);
        for r in rects {
            assert_eq!(r, (0, 20, 1920, 1060));
        }
    }

    #[test]
    fn outer_gap_insets_the_drawable_area_on_every_side() {
        let mut scr = screen();
        scr.outer_gap = 10;
        assert_eq!(scr.drawable(), (10, 30, 1900, 1040));
        assert_eq!(scr.full(), (0, 0, 1920, 1080), "fullscreen ignores the outer gap");
    }

    #[test]
    fn vstack_scenario_2_from_spec() {
        let rects = arrange(LayoutKind::Vstack, 3, screen(), 0.5);
        assert_eq!(rects[0], (0, 20, 960, 1060));
        assert_eq!(rects[1], (960, 20, 960, 530));
        assert_eq!(rects[2], (960, 550, 960, 530));
    }

    #[test]
    fn grid_tiles_drawable_area_exactly() {
        let scr = screen();
        let (_, _, sw, sh) = scr.drawable();
        for n in 1..=10 {
            let rects = arrange(LayoutKind::Grid, n, scr, 0.5);
            assert_eq!(rects.len(), n);
            // Column-major tiling must exactly cover the drawable area: sum
            // of unique column widths equals sw, sum of each column's row
            // heights equals sh.
            let total_area: u64 = rects.iter().map(|(_, _, w, h)| (*w as u64) * (*h as u64)).sum();
            assert_eq!(total_area, (sw as u64) * (sh as u64));
        }
    }

    #[test]
    fn grid_one_client_fills_drawable_area() {
        let rects = arrange(LayoutKind::Grid, 1, screen(), 0.5);
        assert_eq!(rects, vec![(0, 20, 1920, 1060)]);
    }

    /// Section 8: "the union of non-FFT client rectangles exactly tiles
    /// the drawable area up to integer-division remainders" - checked here
    /// for arbitrary client counts rather than a fixed 1..=10 sweep.
    #[quickcheck_macros::quickcheck]
    fn grid_covers_drawable_area_for_any_n(n: u8) -> bool {
        let n = (n as usize % 64) + 1;
        let scr = screen();
        let (_, _, sw, sh) = scr.drawable();
        let rects = arrange(LayoutKind::Grid, n, scr, 0.5);
        let total_area: u64 = rects.iter().map(|(_, _, w, h)| (*w as u64) * (*h as u64)).sum();
        rects.len() == n && total_area == (sw as u64) * (sh as u64)
    }

    #[test]
    fn single_tilable_client_falls_back_to_zoom() {
        let v = arrange(LayoutKind::Vstack, 1, screen(), 0.5);
        let h = arrange(LayoutKind::Hstack, 1, screen(), 0.5);
        assert_eq!(v, vec![(0, 20, 1920, 1060)]);
        assert_eq!(h, vec![(0, 20, 1920, 1060)]);
    }

    #[test]
    fn fullscreen_forces_zero_gap_and_border() {
        let mut c = Client::new(1, String::new(), String::new(), 10, 2);
        c.flags = ClientFlags::FULLSCREEN;
        let (x, y, w, h, bw) = draw_policy(&c, (0, 20, 1920, 1060), LayoutKind::Grid, false, screen(), 2, 10);
        assert_eq!((x, y, w, h, bw), (0, 0, 1920, 1080, 0));
    }

    #[test]
    fn floating_uses_stored_geometry_not_raw_rect() {
        let mut c = Client::new(1, String::new(), String::new(), 4, 2);
        c.flags = ClientFlags::FLOATING;
        c.set_rect(100, 100, 400, 300);
        let (x, y, w, h, bw) = draw_policy(&c, (0, 20, 1920, 1060), LayoutKind::Grid, false, screen(), 2, 4);
        assert_eq!((x, y, w, h, bw), (100, 100, 400, 300, 2));
    }

    #[test]
    fn negative_gap_saturates_at_zero() {
        let c = Client::new(1, String::new(), String::new(), -5, 2);
        let (x, y, w, h, bw) = draw_policy(&c, (0, 20, 1920, 1060), LayoutKind::Grid, false, screen(), 2, -5);
        assert_eq!((x, y), (2, 22));
        assert_eq!((w, h, bw), (1920 - 4, 1060 - 4, 2));
    }
}
