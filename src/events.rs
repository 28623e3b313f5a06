//! Event multiplexer: waits on the X connection fd and the control-socket
//! listener fd, drains and dispatches whichever is ready, flushing the X
//! connection after each wake. A single blocking `XNextEvent` call isn't
//! enough once a second fd (the control socket) needs servicing too, so
//! this polls both with `libc::poll` instead.

use std::os::raw::{c_int, c_long};
use std::os::unix::io::AsRawFd;
use std::os::unix::net::UnixListener;

use log::{debug, info, trace, warn};

use crate::client::{Client, ClientFlags};
use crate::commands;
use crate::ewmh;
use crate::fsa::Fsa;
use crate::socket;
use crate::state::Context;
use crate::xconn::{Atom, XEvent, XWindow};

/// Window-type classification result for a freshly created client (section
/// 4.6 map-request): dock/toolbar windows are never managed at all, the
/// rest either float or tile per the EWMH window-type policy in section 6.
enum WindowClass {
    Unmanaged,
    Floating,
    Tiled,
}

fn classify_window_type(ctx: &Context, window: XWindow) -> WindowClass {
    let atoms = ctx.conn.atoms();
    let types = ctx.conn.get_net_wm_window_type(window);
    if types.is_empty() {
        return WindowClass::Tiled;
    }

    let is = |want: Option<Atom>| want.map(|a| types.contains(&a)).unwrap_or(false);

    if is(atoms.net_wm_window_type_dock) || is(atoms.net_wm_window_type_toolbar) {
        return WindowClass::Unmanaged;
    }
    if is(atoms.net_wm_window_type_notification)
        || is(atoms.net_wm_window_type_dropdown_menu)
        || is(atoms.net_wm_window_type_splash)
        || is(atoms.net_wm_window_type_popup_menu)
        || is(atoms.net_wm_window_type_tooltip)
        || is(atoms.net_wm_window_type_dialog)
    {
        return WindowClass::Floating;
    }
    WindowClass::Tiled
}

fn handle_map_request(ctx: &mut Context, window: XWindow) {
    if ctx.conn.is_override_redirect(window) || ctx.is_managed(window) {
        trace!("ignoring map-request for {:#x} (override-redirect or already managed)", window);
        return;
    }

    match classify_window_type(ctx, window) {
        WindowClass::Unmanaged => {
            debug!("not managing dock/toolbar window {:#x}", window);
            return;
        }
        WindowClass::Floating => {}
        WindowClass::Tiled => {}
    }
    let floating_by_type = matches!(classify_window_type(ctx, window), WindowClass::Floating);

    let (name, class) = ctx.conn.get_wm_class(window).unwrap_or_default();
    let arrangement = ctx.config.arrangement();
    let mut client = Client::new(window, name, class, arrangement.inner_gap, arrangement.border_width);

    if floating_by_type || ctx.conn.get_transient_for(window).is_some() {
        client.flags.insert(ClientFlags::FLOATING);
    }
    if ctx.conn.get_transient_for(window).is_some() {
        client.flags.insert(ClientFlags::TRANSIENT);
    }

    let geometry = ctx.conn.get_window_geometry(window).map(|g| (g.x, g.y, g.w, g.h));
    ctx.place_new_client(&mut client, geometry);

    let (target, follow) = ctx.apply_rules(&mut client);

    ctx.conn.add_to_save_set(window);
    ctx.conn.select_client_input(window);
    ctx.conn.grab_button(window);

    ctx.attach_new_client(client, target, follow);
}

/// Handles both destroy-notify and the non-synthetic-to-root half of
/// unmap-notify (section 4.6, section 9's precedence-bug resolution): both
/// simply unlink whichever workspace owns the window and re-arrange it.
fn handle_client_removed(ctx: &mut Context, window: XWindow) {
    let Some(idx) = ctx.find_client_workspace(window) else {
        trace!("removal event for unmanaged window {:#x}, ignoring", window);
        return;
    };
    ctx.unlink_anywhere(window);
    ctx.relayout_workspace(idx);
}

fn handle_unmap_notify(ctx: &mut Context, window: XWindow, event: XWindow) {
    // Section 9: the source's `!ue->event == screen->root` guard is a
    // precedence bug; the intended check ignores synthetic unmaps
    // delivered to the root rather than to the window's actual parent.
    if event == ctx.conn.root() {
        trace!("ignoring synthetic UnmapNotify delivered to root for {:#x}", window);
        return;
    }
    handle_client_removed(ctx, window);
}

fn handle_enter_notify(ctx: &mut Context, window: XWindow) {
    let arrangement = ctx.config.arrangement();
    if !arrangement.focus_follows_mouse {
        return;
    }
    if ctx.current_workspace_mut().layout == crate::layout::LayoutKind::Zoom {
        return;
    }
    if ctx.is_managed(window) {
        ctx.current_workspace_mut().focus(ctx.conn.as_ref(), Some(window));
    }
}

fn handle_button_press(ctx: &mut Context, window: XWindow, button: c_int) {
    let arrangement = ctx.config.arrangement();
    if button == 1 && arrangement.focus_on_click && ctx.is_managed(window) {
        ctx.current_workspace_mut().focus(ctx.conn.as_ref(), Some(window));
    }
    ctx.conn.allow_replay_pointer();
}

/// Honours every value-mask bit present on the request, clamping width and
/// height to the screen minus border and shifting y down by the bar height
/// when the bar sits on top (section 4.6).
fn handle_configure_request(ctx: &mut Context, req: crate::xconn::ConfigureRequest) {
    let (screen_w, screen_h) = ctx.conn.screen_size();
    let bar_height = ctx.current_workspace_mut().bar_height;
    let bar_on_top = ctx.current_workspace_mut().bar_on_top;
    let mask = req.value_mask;

    let x = if mask & x11::xlib::CWX as c_long as u64 != 0 {
        Some(req.x)
    } else {
        None
    };
    let y = if mask & x11::xlib::CWY as c_long as u64 != 0 {
        let y = if bar_on_top { req.y.max(bar_height as i32) } else { req.y };
        Some(y)
    } else {
        None
    };
    let width = if mask & x11::xlib::CWWidth as c_long as u64 != 0 {
        Some(req.width.min(screen_w.saturating_sub(2 * req.border_width)))
    } else {
        None
    };
    let height = if mask & x11::xlib::CWHeight as c_long as u64 != 0 {
        Some(req.height.min(screen_h.saturating_sub(2 * req.border_width)))
    } else {
        None
    };
    let border_width = if mask & x11::xlib::CWBorderWidth as c_long as u64 != 0 {
        Some(req.border_width)
    } else {
        None
    };
    let sibling = if mask & x11::xlib::CWSibling as c_long as u64 != 0 {
        Some(req.sibling)
    } else {
        None
    };
    let stack_mode = if mask & x11::xlib::CWStackMode as c_long as u64 != 0 {
        Some(req.stack_mode)
    } else {
        None
    };

    ctx.conn
        .configure_window_ext(req.window, x, y, width, height, border_width, sibling, stack_mode);

    if let Some(idx) = ctx.find_client_workspace(req.window) {
        if let (Some(w), Some(h)) = (width, height) {
            if let Some(client) = ctx.client_mut_in(idx, req.window) {
                client.w = w;
                client.h = h;
            }
        }
    }
}

/// `_NET_WM_STATE`: add/remove/toggle, up to two simultaneous state atoms
/// per message (section 4.6). Action codes follow the EWMH convention: 0 =
/// remove, 1 = add, 2 = toggle.
fn handle_net_wm_state(ctx: &mut Context, window: XWindow, action: c_long, data: [c_long; 5]) {
    let Some(idx) = ctx.find_client_workspace(window) else {
        return;
    };
    let atoms = ctx.conn.atoms();
    let fullscreen_atom = atoms.net_wm_state_fullscreen;
    let urgent_atom = atoms.net_wm_state_demands_attention;

    for raw in &data[1..3] {
        let atom = *raw as Atom;
        if atom == 0 {
            continue;
        }
        if Some(atom) == fullscreen_atom {
            apply_state_action(ctx, idx, window, action, ClientFlags::FULLSCREEN, true);
        } else if Some(atom) == urgent_atom {
            apply_state_action(ctx, idx, window, action, ClientFlags::URGENT, false);
        }
    }
}

fn apply_state_action(ctx: &mut Context, idx: usize, window: XWindow, action: c_long, flag: ClientFlags, is_fullscreen: bool) {
    let Some(client) = ctx.client_mut_in(idx, window) else {
        return;
    };
    let now = match action {
        0 => false,
        1 => true,
        2 => !client.flags.contains(flag),
        other => {
            warn!("unrecognised _NET_WM_STATE action code {}", other);
            return;
        }
    };
    client.flags.set(flag, now);

    if is_fullscreen {
        ewmh::on_fullscreen_change(ctx.conn.as_ref(), window, now);
    } else {
        ewmh::on_urgent_change(ctx.conn.as_ref(), window, now);
    }
    ctx.relayout_workspace(idx);
}

fn handle_client_message(ctx: &mut Context, window: XWindow, message_type: Atom, data: [c_long; 5]) {
    let atoms = ctx.conn.atoms();
    if Some(message_type) == atoms.net_wm_state {
        handle_net_wm_state(ctx, window, data[0], data);
    } else if Some(message_type) == atoms.net_close_window {
        crate::workspace::polite_close(ctx.conn.as_ref(), window);
        handle_client_removed(ctx, window);
    } else if Some(message_type) == atoms.net_active_window {
        if let Some(idx) = ctx.find_client_workspace(window) {
            if idx != ctx.current_workspace {
                ctx.switch(idx);
            }
            ctx.workspaces[idx].focus(ctx.conn.as_ref(), Some(window));
        }
    } else if Some(message_type) == atoms.net_current_desktop {
        ctx.switch(data[0] as usize);
    }
}

fn dispatch_x_event(ctx: &mut Context, event: XEvent) {
    trace!("{:?}", event);
    match event {
        XEvent::MapRequest { window } => handle_map_request(ctx, window),
        XEvent::DestroyNotify { window } => handle_client_removed(ctx, window),
        XEvent::UnmapNotify { window, event } => handle_unmap_notify(ctx, window, event),
        XEvent::EnterNotify { window } => handle_enter_notify(ctx, window),
        XEvent::ButtonPress { window, button, .. } => handle_button_press(ctx, window, button as c_int),
        XEvent::ConfigureRequest(req) => handle_configure_request(ctx, req),
        XEvent::ClientMessage { window, message_type, data } => handle_client_message(ctx, window, message_type, data),
        XEvent::KeyPress { .. } => unreachable!("key-press is routed through the FSA, not dispatch_x_event"),
        XEvent::Other => {}
    }
}

/// Drain every pending X event non-blocking, dispatching key-presses
/// through the input FSA and everything else through `dispatch_x_event`
/// (section 4.6: "drain all pending events non-blocking and dispatch by
/// event type").
fn drain_x_events(ctx: &mut Context, fsa: &mut Fsa) {
    while ctx.conn.pending() > 0 {
        match ctx.conn.next_event() {
            XEvent::KeyPress { keycode, state } => {
                fsa.handle_key(ctx, keycode, state);
                ctx.emit_status(&format!("{:?}", fsa.state()));
            }
            other => dispatch_x_event(ctx, other),
        }
    }
}

/// The event multiplexer's main loop (section 4.6, section 5). Blocks on
/// `libc::poll` over the X connection fd and the socket listener fd; when
/// both are ready in the same wake, the socket command is processed first,
/// then all pending X events are drained, per the ordering guarantee in
/// section 5.
pub fn run(ctx: &mut Context, fsa: &mut Fsa, listener: &UnixListener) -> i32 {
    let x_fd = ctx.conn.connection_fd();
    let sock_fd = listener.as_raw_fd();

    let mut fds = [
        libc::pollfd { fd: x_fd, events: libc::POLLIN, revents: 0 },
        libc::pollfd { fd: sock_fd, events: libc::POLLIN, revents: 0 },
    ];

    info!("entering event loop");
    while ctx.running {
        fds[0].revents = 0;
        fds[1].revents = 0;
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == std::io::ErrorKind::Interrupted {
                continue;
            }
            warn!("poll failed: {} - terminating event loop", err);
            break;
        }

        if fds[1].revents & libc::POLLIN != 0 {
            socket::accept_and_handle(listener, ctx);
        }
        if fds[0].revents & libc::POLLIN != 0 {
            drain_x_events(ctx, fsa);
        }
        // A connection error surfaces as the X fd becoming readable with no
        // events actually queued, or a hangup bit set (section 7: "any
        // X-connection error terminates the loop").
        if fds[0].revents & (libc::POLLHUP | libc::POLLERR) != 0 {
            warn!("X connection error detected, terminating event loop");
            break;
        }

        ctx.conn.flush();
    }
    info!("event loop exited with code {}", ctx.exit_code);
    ctx.exit_code
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::xconn::tests::NullConn;

    fn ctx() -> Context {
        Context::new(Box::new(NullConn::default()), Config::default())
    }

    #[test]
    fn unmap_notify_synthetic_to_root_is_ignored() {
        let mut c = ctx();
        c.workspaces[0].append(Client::new(1, String::new(), String::new(), 0, 1));
        let root = c.conn.root();
        handle_unmap_notify(&mut c, 1, root);
        assert_eq!(c.workspaces[0].client_count(), 1, "synthetic unmap to root must not unlink the client");
    }

    #[test]
    fn unmap_notify_from_non_root_unlinks() {
        let mut c = ctx();
        c.workspaces[0].append(Client::new(1, String::new(), String::new(), 0, 1));
        handle_unmap_notify(&mut c, 1, 1);
        assert_eq!(c.workspaces[0].client_count(), 0);
    }

    #[test]
    fn destroy_notify_of_unmanaged_window_is_a_no_op() {
        let mut c = ctx();
        handle_client_removed(&mut c, 999);
        assert_eq!(c.workspaces[0].client_count(), 0);
    }

    #[test]
    fn net_wm_state_toggle_flips_fullscreen() {
        let mut c = ctx();
        c.workspaces[0].append(Client::new(1, String::new(), String::new(), 0, 1));
        let atoms = c.conn.atoms();
        let fullscreen = atoms.net_wm_state_fullscreen.unwrap_or(0);
        handle_net_wm_state(&mut c, 1, 2, [0, fullscreen as c_long, 0, 0, 0]);
        assert!(c.workspaces[0].clients.get(1).unwrap().flags.contains(ClientFlags::FULLSCREEN));
        handle_net_wm_state(&mut c, 1, 2, [0, fullscreen as c_long, 0, 0, 0]);
        assert!(!c.workspaces[0].clients.get(1).unwrap().flags.contains(ClientFlags::FULLSCREEN));
    }
}
