//! The workspace model and its operations (section 3, section 4.2).

use log::{debug, warn};

use crate::client::{Client, ClientFlags, ClientList};
use crate::ewmh;
use crate::layout::{self, LayoutKind, ScreenGeometry};
use crate::xconn::{XConn, XWindow};

/// Lower bound of the master-ratio invariant in section 3: neither region
/// of a stack layout may collapse to zero.
pub const MIN_MASTER_RATIO: f32 = 0.1;
pub const MAX_MASTER_RATIO: f32 = 1.0;

#[derive(Debug, Clone)]
pub struct Workspace {
    pub layout: LayoutKind,
    pub clients: ClientList,
    /// Gap baseline inherited by new clients.
    pub gap: i32,
    pub outer_gap: u32,
    pub master_ratio: f32,
    pub bar_height: u32,
    pub bar_on_top: bool,
    /// Zero gap/border override for the zoom layout, per section 4.3.
    pub zoom_gap: bool,
    pub border_width: u32,
    pub current: Option<XWindow>,
    pub previous_focus: Option<XWindow>,
}

impl Workspace {
    pub fn new(gap: i32, master_ratio: f32, bar_height: u32, border_width: u32) -> Self {
        Workspace {
            layout: LayoutKind::default(),
            clients: ClientList::new(),
            gap,
            outer_gap: 0,
            master_ratio: clamp_master_ratio(master_ratio),
            bar_height,
            bar_on_top: true,
            zoom_gap: false,
            border_width,
            current: None,
            previous_focus: None,
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn set_master_ratio(&mut self, ratio: f32) {
        self.master_ratio = clamp_master_ratio(ratio);
    }

    pub fn set_layout(&mut self, layout: LayoutKind) {
        self.layout = layout;
    }

    fn screen_geometry(&self, width: u32, height: u32) -> ScreenGeometry {
        // Section 4.3: bar reservation is suppressed while any client on
        // the workspace is fullscreen.
        let bar_height = if self.has_fullscreen() { 0 } else { self.bar_height };
        ScreenGeometry {
            width,
            height,
            bar_height,
            bar_on_top: self.bar_on_top,
            outer_gap: self.outer_gap,
        }
    }

    /// Append a freshly created client at the tail, focusing it.
    pub fn append(&mut self, client: Client) {
        let window = client.window;
        self.clients.append(client);
        self.previous_focus = self.current;
        self.current = Some(window);
    }

    /// Set input focus to `window` (must already be in this workspace, or
    /// `None` to clear focus), updating previous-focus and propagating
    /// `_NET_ACTIVE_WINDOW`.
    pub fn focus(&mut self, conn: &dyn XConn, window: Option<XWindow>) {
        if window == self.current {
            return;
        }
        self.previous_focus = self.current;
        self.current = window;
        if let Some(w) = window {
            conn.set_input_focus(w);
        }
        ewmh::on_focus_change(conn, window);
    }

    /// Re-focus the predecessor of `window` in this workspace (used after
    /// a client is removed or moved away), falling back to the new tail.
    pub fn focus_predecessor_of(&mut self, conn: &dyn XConn, window: XWindow) {
        let replacement = self
            .clients
            .predecessor(window)
            .map(|c| c.window)
            .or_else(|| self.clients.head().map(|c| c.window));
        self.focus(conn, replacement);
    }

    /// Whether any client on this workspace is fullscreen - bar
    /// reservation is suppressed while that holds (section 4.3).
    pub fn has_fullscreen(&self) -> bool {
        self.clients.iter().any(|c| c.flags.contains(ClientFlags::FULLSCREEN))
    }

    /// Recompute and apply geometry for every non-FFT client, then draw
    /// every client (tiled or not) per the draw policy.
    pub fn relayout(&mut self, conn: &dyn XConn, screen_width: u32, screen_height: u32) {
        let screen = self.screen_geometry(screen_width, screen_height);
        let windows = self.clients.non_fft_windows();
        let rects = layout::arrange(self.layout, windows.len(), screen, self.master_ratio);

        for (window, rect) in windows.into_iter().zip(rects.into_iter()) {
            self.draw_one(conn, screen, window, rect);
        }

        // Floating and fullscreen clients are drawn at their own stored
        // geometry (or the full screen, if fullscreen) regardless of the
        // tiling pass above.
        let fft_windows: Vec<XWindow> = self
            .clients
            .iter()
            .filter(|c| c.is_fft())
            .map(|c| c.window)
            .collect();
        for window in fft_windows {
            self.draw_one(conn, screen, window, (0, 0, 0, 0));
        }
    }

    fn draw_one(&mut self, conn: &dyn XConn, screen: ScreenGeometry, window: XWindow, raw_rect: layout::Rect) {
        let gap = self.gap;
        let border_width = self.border_width;
        let layout = self.layout;
        let zoom_gap = self.zoom_gap;
        let Some(client) = self.clients.get_mut(window) else {
            return;
        };
        let (x, y, w, h, bw) = layout::draw_policy(client, raw_rect, layout, zoom_gap, screen, border_width, gap);
        client.set_rect(x, y, w, h);
        conn.configure_window(window, x, y, w, h, bw);
        conn.set_border_width(window, bw);
    }

    /// Map every client on this workspace.
    pub fn map_all(&self, conn: &dyn XConn) {
        for c in self.clients.iter() {
            conn.map_window(c.window);
        }
    }

    /// Unmap every client on this workspace.
    pub fn unmap_all(&self, conn: &dyn XConn) {
        for c in self.clients.iter() {
            conn.unmap_window(c.window);
        }
    }

    /// Kill the current client on this workspace (section 4.2): a polite
    /// `WM_DELETE_WINDOW` client message if the window advertises support
    /// for it via `WM_PROTOCOLS`, otherwise a forcible `XKillClient`. The
    /// client is then unlinked from the list. A no-op on an empty
    /// workspace.
    pub fn kill_current(&mut self, conn: &dyn XConn) {
        let Some(window) = self.current else {
            debug!("kill attempted on empty workspace, no-op");
            return;
        };
        polite_close(conn, window);
        self.clients.unlink(window);
        self.focus_predecessor_of(conn, window);
    }
}

/// Close `window` politely - `WM_DELETE_WINDOW` if it advertises support via
/// `WM_PROTOCOLS`, otherwise a forcible `XKillClient` - shared by the `kill`
/// command (`Workspace::kill_current`) and the `_NET_CLOSE_WINDOW` client
/// message handler, both of which section 3 lists as client-destroying
/// triggers with the same polite-first semantics.
pub fn polite_close(conn: &dyn XConn, window: XWindow) {
    if conn.supports_wm_delete(window) {
        if let Err(e) = conn.send_wm_delete(window) {
            warn!("failed to send WM_DELETE_WINDOW to {:#x}: {}", window, e);
            conn.kill_client(window);
        }
    } else {
        conn.kill_client(window);
    }
}

fn clamp_master_ratio(ratio: f32) -> f32 {
    ratio.clamp(MIN_MASTER_RATIO, MAX_MASTER_RATIO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use crate::xconn::tests::NullConn;

    fn client(w: XWindow) -> Client {
        Client::new(w, String::new(), String::new(), 0, 1)
    }

    #[test]
    fn master_ratio_is_clamped_into_range() {
        let mut ws = Workspace::new(0, 0.5, 20, 1);
        ws.set_master_ratio(0.0);
        assert_eq!(ws.master_ratio, MIN_MASTER_RATIO);
        ws.set_master_ratio(2.0);
        assert_eq!(ws.master_ratio, MAX_MASTER_RATIO);
    }

    #[test]
    fn append_focuses_new_client() {
        let mut ws = Workspace::new(0, 0.5, 20, 1);
        ws.append(client(1));
        assert_eq!(ws.current, Some(1));
        ws.append(client(2));
        assert_eq!(ws.current, Some(2));
        assert_eq!(ws.previous_focus, Some(1));
    }

    #[test]
    fn kill_current_on_empty_workspace_is_a_no_op() {
        let mut ws = Workspace::new(0, 0.5, 20, 1);
        let conn = NullConn::default();
        ws.kill_current(&conn);
        assert_eq!(ws.client_count(), 0);
    }

    #[test]
    fn kill_current_unlinks_and_refocuses_predecessor() {
        let mut ws = Workspace::new(0, 0.5, 20, 1);
        ws.append(client(1));
        ws.append(client(2));
        ws.append(client(3));
        ws.focus(&NullConn::default(), Some(3));
        let conn = NullConn::default();
        ws.kill_current(&conn);
        assert_eq!(ws.client_count(), 2);
        assert_eq!(ws.current, Some(2));
    }
}
