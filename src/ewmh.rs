//! EWMH state sync (section 4.9).
//!
//! The individual property-setting calls are thin wrappers already living
//! on `xconn::XConn`; this module is the place the *sequencing* described
//! in section 4.9 happens - setup-time advertisement, and the handful of
//! multi-property updates that follow a single workspace switch or focus
//! change.

use crate::layout::ScreenGeometry;
use crate::xconn::XConn;

/// Advertise supported atoms and set the desktop count/geometry/viewport
/// and the "howm" name, as section 4.9 requires at setup.
pub fn setup(conn: &dyn XConn, workspace_count: u32, screen: ScreenGeometry) {
    let atoms = conn.atoms();
    let supported: Vec<_> = [
        atoms.net_wm_window_type,
        atoms.net_wm_window_type_dock,
        atoms.net_wm_window_type_toolbar,
        atoms.net_wm_window_type_notification,
        atoms.net_wm_window_type_dropdown_menu,
        atoms.net_wm_window_type_splash,
        atoms.net_wm_window_type_popup_menu,
        atoms.net_wm_window_type_tooltip,
        atoms.net_wm_window_type_dialog,
        atoms.net_wm_state,
        atoms.net_wm_state_fullscreen,
        atoms.net_wm_state_demands_attention,
        atoms.net_active_window,
        atoms.net_current_desktop,
        atoms.net_workarea,
        atoms.net_number_of_desktops,
        atoms.net_desktop_geometry,
        atoms.net_desktop_viewport,
        atoms.net_close_window,
        atoms.net_supported,
        atoms.net_supporting_wm_check,
        atoms.net_wm_name,
    ]
    .iter()
    .filter_map(|a| *a)
    .collect();

    conn.set_supported(&supported);
    conn.set_net_number_of_desktops(workspace_count);
    conn.set_desktop_geometry(screen.width, screen.height);
    conn.set_desktop_viewport();
    conn.set_wm_name("howm");
}

/// Propagate `_NET_CURRENT_DESKTOP` and `_NET_WORKAREA` after a workspace
/// switch.
pub fn on_workspace_switch(conn: &dyn XConn, new_index: u32, screen: ScreenGeometry) {
    conn.set_net_current_desktop(new_index);
    let (x, y, w, h) = screen.drawable();
    conn.set_net_workarea(x, y, w, h);
}

/// Propagate `_NET_ACTIVE_WINDOW` after a focus change. `None` clears it.
pub fn on_focus_change(conn: &dyn XConn, focused: Option<u64>) {
    conn.set_net_active_window(focused);
}

/// Set or clear `_NET_WM_STATE` fullscreen on a fullscreen transition.
pub fn on_fullscreen_change(conn: &dyn XConn, window: u64, on: bool) {
    conn.set_net_wm_state_fullscreen(window, on);
}

/// Set or clear `_NET_WM_STATE` urgency.
pub fn on_urgent_change(conn: &dyn XConn, window: u64, on: bool) {
    conn.set_net_wm_state_urgent(window, on);
}
