//! The X binding facade.
//!
//! The X server connection is treated as an external collaborator:
//! `XConn` is the seam the rest of the core is written against, and
//! `XlibConn` is a thin, largely mechanical wrapper over `x11::xlib` in a
//! direct, unsafe-FFI style (`XOpenDisplay`, `XGrabKey`,
//! `XConfigureWindow`, ...). None of the window-manager *logic* lives here;
//! every method is a one-to-one mapping onto an Xlib call.

use std::ffi::CString;
use std::os::raw::{c_int, c_long, c_uchar, c_uint, c_ulong, c_void};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, trace, warn};
use x11::xlib;

use crate::error::{Result, WmError};

/// Set by `wm_detected` if `XSelectInput`'s substructure-redirect request
/// at startup draws a `BadAccess`, meaning another window manager already
/// holds it (section 7: fatal - clean shutdown). A plain static suffices
/// here in place of the teacher's `lazy_static`-guarded `Mutex`, since the
/// only write happens synchronously inside `XlibConn::open`, before any
/// other thread (there is none - section 5) could read it.
static WM_DETECTED: AtomicBool = AtomicBool::new(false);

unsafe extern "C" fn wm_detected(_display: *mut xlib::Display, event: *mut xlib::XErrorEvent) -> c_int {
    let code = (*event).error_code;
    if code == xlib::BadAccess {
        WM_DETECTED.store(true, Ordering::SeqCst);
    } else {
        warn!("X error (code {}) during startup substructure-redirect probe", code);
    }
    0
}

pub type XWindow = xlib::Window;
pub type Atom = xlib::Atom;
pub type KeySym = xlib::KeySym;

#[derive(Debug, Clone, Copy)]
pub struct WindowGeometry {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
    pub override_redirect: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ConfigureRequest {
    pub window: XWindow,
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    pub border_width: u32,
    pub sibling: XWindow,
    pub stack_mode: c_int,
    pub value_mask: c_ulong,
}

#[derive(Debug, Clone)]
pub enum XEvent {
    MapRequest {
        window: XWindow,
    },
    DestroyNotify {
        window: XWindow,
    },
    UnmapNotify {
        window: XWindow,
        event: XWindow,
    },
    EnterNotify {
        window: XWindow,
    },
    ButtonPress {
        window: XWindow,
        button: c_uint,
        state: c_uint,
    },
    ConfigureRequest(ConfigureRequest),
    ClientMessage {
        window: XWindow,
        message_type: Atom,
        data: [c_long; 5],
    },
    KeyPress {
        keycode: c_uint,
        state: c_uint,
    },
    Other,
}

/// Atoms interned once at setup. A failed intern (section 7: "atom intern
/// failure - warn and continue; affected feature disabled") leaves the
/// corresponding field `None` rather than aborting.
#[derive(Debug, Default)]
pub struct Atoms {
    pub wm_protocols: Option<Atom>,
    pub wm_delete_window: Option<Atom>,
    pub net_wm_window_type: Option<Atom>,
    pub net_wm_window_type_dock: Option<Atom>,
    pub net_wm_window_type_toolbar: Option<Atom>,
    pub net_wm_window_type_notification: Option<Atom>,
    pub net_wm_window_type_dropdown_menu: Option<Atom>,
    pub net_wm_window_type_splash: Option<Atom>,
    pub net_wm_window_type_popup_menu: Option<Atom>,
    pub net_wm_window_type_tooltip: Option<Atom>,
    pub net_wm_window_type_dialog: Option<Atom>,
    pub net_wm_state: Option<Atom>,
    pub net_wm_state_fullscreen: Option<Atom>,
    pub net_wm_state_demands_attention: Option<Atom>,
    pub net_active_window: Option<Atom>,
    pub net_current_desktop: Option<Atom>,
    pub net_workarea: Option<Atom>,
    pub net_number_of_desktops: Option<Atom>,
    pub net_desktop_geometry: Option<Atom>,
    pub net_desktop_viewport: Option<Atom>,
    pub net_close_window: Option<Atom>,
    pub net_supported: Option<Atom>,
    pub net_supporting_wm_check: Option<Atom>,
    pub net_wm_name: Option<Atom>,
    pub utf8_string: Option<Atom>,
}

pub trait XConn {
    fn connection_fd(&self) -> c_int;
    fn flush(&self);
    fn pending(&self) -> c_int;
    /// Blocks until one event is available and returns it.
    fn next_event(&self) -> XEvent;
    fn screen_size(&self) -> (u32, u32);
    fn root(&self) -> XWindow;

    fn map_window(&self, w: XWindow);
    fn unmap_window(&self, w: XWindow);
    fn destroy_window(&self, w: XWindow);
    fn reparent_to_root(&self, w: XWindow);
    fn configure_window(&self, w: XWindow, x: i32, y: i32, width: u32, height: u32, border_width: u32);
    /// Configure-request passthrough (section 4.6): only the bits present
    /// in the original value-mask are honoured, everything else is `None`.
    #[allow(clippy::too_many_arguments)]
    fn configure_window_ext(
        &self,
        w: XWindow,
        x: Option<i32>,
        y: Option<i32>,
        width: Option<u32>,
        height: Option<u32>,
        border_width: Option<u32>,
        sibling: Option<XWindow>,
        stack_mode: Option<c_int>,
    );
    fn set_border_width(&self, w: XWindow, width: u32);
    fn set_border_color(&self, w: XWindow, pixel: c_ulong);
    fn set_input_focus(&self, w: XWindow);
    fn grab_button(&self, w: XWindow);
    fn add_to_save_set(&self, w: XWindow);
    /// Select the event mask a managed client window needs (section 4.6:
    /// enter-notify, unmap/destroy via structure-notify, property changes
    /// for a future WM_CLASS/WM_HINTS update).
    fn select_client_input(&self, w: XWindow);
    /// Select substructure redirect/notify on the root (section 6).
    fn select_root_input(&self);
    /// Clear the root's event mask (section 5 cleanup: "the event mask on
    /// the root is cleared").
    fn clear_root_input(&self);
    /// `XAllowEvents(..., ReplayPointer, ...)` - section 4.6 button-press:
    /// "always allow replay pointer".
    fn allow_replay_pointer(&self);

    fn get_window_geometry(&self, w: XWindow) -> Option<WindowGeometry>;
    fn get_wm_class(&self, w: XWindow) -> Option<(String, String)>;
    fn is_override_redirect(&self, w: XWindow) -> bool;
    fn supports_wm_delete(&self, w: XWindow) -> bool;
    fn send_wm_delete(&self, w: XWindow) -> Result<()>;
    fn kill_client(&self, w: XWindow);
    fn get_transient_for(&self, w: XWindow) -> Option<XWindow>;
    fn get_net_wm_window_type(&self, w: XWindow) -> Vec<Atom>;

    fn atoms(&self) -> &Atoms;

    fn ungrab_all_keys(&self);
    fn grab_key(&self, keycode: c_int, modmask: c_uint);
    fn keysym_to_keycode(&self, keysym: KeySym) -> c_int;

    fn set_net_active_window(&self, w: Option<XWindow>);
    fn set_net_current_desktop(&self, idx: u32);
    fn set_net_workarea(&self, x: i32, y: i32, w: u32, h: u32);
    fn set_net_number_of_desktops(&self, n: u32);
    fn set_net_wm_state_fullscreen(&self, w: XWindow, on: bool);
    fn set_net_wm_state_urgent(&self, w: XWindow, on: bool);
    fn set_supported(&self, atoms: &[Atom]);
    fn set_desktop_geometry(&self, w: u32, h: u32);
    fn set_desktop_viewport(&self);
    fn set_wm_name(&self, name: &str);

    fn spawn(&self, argv: &[String]);
}

pub struct XlibConn {
    display: *mut xlib::Display,
    root: XWindow,
    screen_width: u32,
    screen_height: u32,
    atoms: Atoms,
}

impl std::fmt::Debug for XlibConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XlibConn")
            .field("display", &self.display)
            .field("root", &self.root)
            .finish()
    }
}

/// Safe because the display connection is only ever touched from the
/// single event-loop thread (section 5: "single-threaded and
/// event-driven"); this type is never actually shared across threads, it
/// is only stored inside `Context`, which is itself `!Send` in practice.
unsafe impl Send for XlibConn {}

impl XlibConn {
    pub fn open() -> Result<Self> {
        let display = unsafe { xlib::XOpenDisplay(std::ptr::null()) };
        if display.is_null() {
            return Err(WmError::XConnection);
        }

        let screen = unsafe { xlib::XDefaultScreenOfDisplay(display) };
        if screen.is_null() {
            unsafe { xlib::XCloseDisplay(display) };
            return Err(WmError::NoScreen);
        }

        let root = unsafe { xlib::XDefaultRootWindow(display) };
        let (w, h) = unsafe { ((*screen).width as u32, (*screen).height as u32) };

        WM_DETECTED.store(false, Ordering::SeqCst);
        unsafe {
            xlib::XSetErrorHandler(Some(wm_detected));
            xlib::XSelectInput(display, root, xlib::SubstructureRedirectMask);
            xlib::XSync(display, xlib::False);
        }
        if WM_DETECTED.load(Ordering::SeqCst) {
            unsafe { xlib::XCloseDisplay(display) };
            return Err(WmError::WmAlreadyRunning);
        }

        let mut conn = XlibConn {
            display,
            root,
            screen_width: w,
            screen_height: h,
            atoms: Atoms::default(),
        };
        conn.atoms = conn.intern_all_atoms();
        Ok(conn)
    }

    fn intern(&self, name: &str) -> Option<Atom> {
        let c_name = CString::new(name).ok()?;
        let atom = unsafe { xlib::XInternAtom(self.display, c_name.as_ptr(), xlib::False) };
        if atom == 0 {
            warn!("failed to intern atom {}", name);
            None
        } else {
            Some(atom)
        }
    }

    fn intern_all_atoms(&self) -> Atoms {
        Atoms {
            wm_protocols: self.intern("WM_PROTOCOLS"),
            wm_delete_window: self.intern("WM_DELETE_WINDOW"),
            net_wm_window_type: self.intern("_NET_WM_WINDOW_TYPE"),
            net_wm_window_type_dock: self.intern("_NET_WM_WINDOW_TYPE_DOCK"),
            net_wm_window_type_toolbar: self.intern("_NET_WM_WINDOW_TYPE_TOOLBAR"),
            net_wm_window_type_notification: self.intern("_NET_WM_WINDOW_TYPE_NOTIFICATION"),
            net_wm_window_type_dropdown_menu: self.intern("_NET_WM_WINDOW_TYPE_DROPDOWN_MENU"),
            net_wm_window_type_splash: self.intern("_NET_WM_WINDOW_TYPE_SPLASH"),
            net_wm_window_type_popup_menu: self.intern("_NET_WM_WINDOW_TYPE_POPUP_MENU"),
            net_wm_window_type_tooltip: self.intern("_NET_WM_WINDOW_TYPE_TOOLTIP"),
            net_wm_window_type_dialog: self.intern("_NET_WM_WINDOW_TYPE_DIALOG"),
            net_wm_state: self.intern("_NET_WM_STATE"),
            net_wm_state_fullscreen: self.intern("_NET_WM_STATE_FULLSCREEN"),
            net_wm_state_demands_attention: self.intern("_NET_WM_STATE_DEMANDS_ATTENTION"),
            net_active_window: self.intern("_NET_ACTIVE_WINDOW"),
            net_current_desktop: self.intern("_NET_CURRENT_DESKTOP"),
            net_workarea: self.intern("_NET_WORKAREA"),
            net_number_of_desktops: self.intern("_NET_NUMBER_OF_DESKTOPS"),
            net_desktop_geometry: self.intern("_NET_DESKTOP_GEOMETRY"),
            net_desktop_viewport: self.intern("_NET_DESKTOP_VIEWPORT"),
            net_close_window: self.intern("_NET_CLOSE_WINDOW"),
            net_supported: self.intern("_NET_SUPPORTED"),
            net_supporting_wm_check: self.intern("_NET_SUPPORTING_WM_CHECK"),
            net_wm_name: self.intern("_NET_WM_NAME"),
            utf8_string: self.intern("UTF8_STRING"),
        }
    }

    fn change_property_32(&self, w: XWindow, prop: Atom, typ: Atom, data: &[c_long]) {
        unsafe {
            xlib::XChangeProperty(
                self.display,
                w,
                prop,
                typ,
                32,
                xlib::PropModeReplace,
                data.as_ptr() as *const c_uchar,
                data.len() as c_int,
            );
        }
    }
}

impl XConn for XlibConn {
    fn connection_fd(&self) -> c_int {
        unsafe { xlib::XConnectionNumber(self.display) }
    }

    fn flush(&self) {
        unsafe {
            xlib::XFlush(self.display);
        }
    }

    fn pending(&self) -> c_int {
        unsafe { xlib::XPending(self.display) }
    }

    fn next_event(&self) -> XEvent {
        let mut event: xlib::XEvent = unsafe { std::mem::zeroed() };
        unsafe { xlib::XNextEvent(self.display, &mut event) };

        #[allow(non_upper_case_globals)]
        unsafe {
            match event.get_type() {
                xlib::MapRequest => XEvent::MapRequest {
                    window: event.map_request.window,
                },
                xlib::DestroyNotify => XEvent::DestroyNotify {
                    window: event.destroy_window.window,
                },
                xlib::UnmapNotify => XEvent::UnmapNotify {
                    window: event.unmap.window,
                    event: event.unmap.event,
                },
                xlib::EnterNotify => XEvent::EnterNotify {
                    window: event.crossing.window,
                },
                xlib::ButtonPress => XEvent::ButtonPress {
                    window: event.button.window,
                    button: event.button.button,
                    state: event.button.state,
                },
                xlib::KeyPress => XEvent::KeyPress {
                    keycode: event.key.keycode,
                    state: event.key.state,
                },
                xlib::ConfigureRequest => XEvent::ConfigureRequest(ConfigureRequest {
                    window: event.configure_request.window,
                    x: event.configure_request.x,
                    y: event.configure_request.y,
                    width: event.configure_request.width as u32,
                    height: event.configure_request.height as u32,
                    border_width: event.configure_request.border_width as u32,
                    sibling: event.configure_request.above,
                    stack_mode: event.configure_request.detail,
                    value_mask: event.configure_request.value_mask,
                }),
                xlib::ClientMessage => XEvent::ClientMessage {
                    window: event.client_message.window,
                    message_type: event.client_message.message_type,
                    data: [
                        event.client_message.data.get_long(0),
                        event.client_message.data.get_long(1),
                        event.client_message.data.get_long(2),
                        event.client_message.data.get_long(3),
                        event.client_message.data.get_long(4),
                    ],
                },
                other => {
                    trace!("unhandled X event type {}", other);
                    XEvent::Other
                }
            }
        }
    }

    fn screen_size(&self) -> (u32, u32) {
        (self.screen_width, self.screen_height)
    }

    fn root(&self) -> XWindow {
        self.root
    }

    fn map_window(&self, w: XWindow) {
        unsafe {
            xlib::XMapWindow(self.display, w);
        }
    }

    fn unmap_window(&self, w: XWindow) {
        unsafe {
            xlib::XUnmapWindow(self.display, w);
        }
    }

    fn destroy_window(&self, w: XWindow) {
        unsafe {
            xlib::XDestroyWindow(self.display, w);
        }
    }

    fn reparent_to_root(&self, w: XWindow) {
        unsafe {
            xlib::XReparentWindow(self.display, w, self.root, 0, 0);
            xlib::XRemoveFromSaveSet(self.display, w);
        }
    }

    fn configure_window(&self, w: XWindow, x: i32, y: i32, width: u32, height: u32, border_width: u32) {
        let mut changes = xlib::XWindowChanges {
            x,
            y,
            width: width as c_int,
            height: height as c_int,
            border_width: border_width as c_int,
            sibling: 0,
            stack_mode: 0,
        };
        let mask = (xlib::CWX | xlib::CWY | xlib::CWWidth | xlib::CWHeight | xlib::CWBorderWidth) as c_uint;
        unsafe {
            xlib::XConfigureWindow(self.display, w, mask, &mut changes);
        }
    }

    fn configure_window_ext(
        &self,
        w: XWindow,
        x: Option<i32>,
        y: Option<i32>,
        width: Option<u32>,
        height: Option<u32>,
        border_width: Option<u32>,
        sibling: Option<XWindow>,
        stack_mode: Option<c_int>,
    ) {
        let mut changes = xlib::XWindowChanges {
            x: x.unwrap_or(0),
            y: y.unwrap_or(0),
            width: width.unwrap_or(0) as c_int,
            height: height.unwrap_or(0) as c_int,
            border_width: border_width.unwrap_or(0) as c_int,
            sibling: sibling.unwrap_or(0),
            stack_mode: stack_mode.unwrap_or(0),
        };
        let mut mask: c_uint = 0;
        if x.is_some() {
            mask |= xlib::CWX as c_uint;
        }
        if y.is_some() {
            mask |= xlib::CWY as c_uint;
        }
        if width.is_some() {
            mask |= xlib::CWWidth as c_uint;
        }
        if height.is_some() {
            mask |= xlib::CWHeight as c_uint;
        }
        if border_width.is_some() {
            mask |= xlib::CWBorderWidth as c_uint;
        }
        if sibling.is_some() {
            mask |= xlib::CWSibling as c_uint;
        }
        if stack_mode.is_some() {
            mask |= xlib::CWStackMode as c_uint;
        }
        unsafe {
            xlib::XConfigureWindow(self.display, w, mask, &mut changes);
        }
    }

    fn set_border_width(&self, w: XWindow, width: u32) {
        unsafe {
            xlib::XSetWindowBorderWidth(self.display, w, width);
        }
    }

    fn set_border_color(&self, w: XWindow, pixel: c_ulong) {
        unsafe {
            xlib::XSetWindowBorder(self.display, w, pixel);
        }
    }

    fn set_input_focus(&self, w: XWindow) {
        unsafe {
            xlib::XSetInputFocus(self.display, w, xlib::RevertToPointerRoot, xlib::CurrentTime);
        }
        self.set_net_active_window(Some(w));
    }

    fn grab_button(&self, w: XWindow) {
        unsafe {
            xlib::XGrabButton(
                self.display,
                xlib::Button1 as c_uint,
                xlib::AnyModifier,
                w,
                xlib::False,
                (xlib::ButtonPressMask) as c_uint,
                xlib::GrabModeSync,
                xlib::GrabModeSync,
                0,
                0,
            );
        }
    }

    fn add_to_save_set(&self, w: XWindow) {
        unsafe {
            xlib::XAddToSaveSet(self.display, w);
        }
    }

    fn select_client_input(&self, w: XWindow) {
        let mask = xlib::EnterWindowMask
            | xlib::FocusChangeMask
            | xlib::PropertyChangeMask
            | xlib::StructureNotifyMask;
        unsafe {
            xlib::XSelectInput(self.display, w, mask);
        }
    }

    fn select_root_input(&self) {
        let mask = xlib::SubstructureRedirectMask | xlib::SubstructureNotifyMask;
        unsafe {
            xlib::XSelectInput(self.display, self.root, mask);
        }
    }

    fn clear_root_input(&self) {
        unsafe {
            xlib::XSelectInput(self.display, self.root, xlib::NoEventMask);
        }
    }

    fn allow_replay_pointer(&self) {
        unsafe {
            xlib::XAllowEvents(self.display, xlib::ReplayPointer, xlib::CurrentTime);
        }
    }

    fn get_window_geometry(&self, w: XWindow) -> Option<WindowGeometry> {
        unsafe {
            let mut attrs: xlib::XWindowAttributes = std::mem::zeroed();
            if xlib::XGetWindowAttributes(self.display, w, &mut attrs) == 0 {
                return None;
            }
            Some(WindowGeometry {
                x: attrs.x,
                y: attrs.y,
                w: attrs.width.max(1) as u32,
                h: attrs.height.max(1) as u32,
                override_redirect: attrs.override_redirect != 0,
            })
        }
    }

    fn get_wm_class(&self, w: XWindow) -> Option<(String, String)> {
        unsafe {
            let mut hint: xlib::XClassHint = std::mem::zeroed();
            if xlib::XGetClassHint(self.display, w, &mut hint) == 0 {
                return None;
            }
            let instance = c_str_to_string(hint.res_name);
            let class = c_str_to_string(hint.res_class);
            if !hint.res_name.is_null() {
                xlib::XFree(hint.res_name as *mut c_void);
            }
            if !hint.res_class.is_null() {
                xlib::XFree(hint.res_class as *mut c_void);
            }
            Some((instance, class))
        }
    }

    fn is_override_redirect(&self, w: XWindow) -> bool {
        self.get_window_geometry(w)
            .map(|g| g.override_redirect)
            .unwrap_or(false)
    }

    fn supports_wm_delete(&self, w: XWindow) -> bool {
        let Some(delete) = self.atoms.wm_delete_window else {
            return false;
        };
        unsafe {
            let mut protocols: *mut Atom = std::ptr::null_mut();
            let mut count: c_int = 0;
            if xlib::XGetWMProtocols(self.display, w, &mut protocols, &mut count) == 0 {
                return false;
            }
            let slice = std::slice::from_raw_parts(protocols, count as usize);
            let found = slice.contains(&delete);
            xlib::XFree(protocols as *mut c_void);
            found
        }
    }

    fn send_wm_delete(&self, w: XWindow) -> Result<()> {
        let (Some(wm_protocols), Some(delete)) = (self.atoms.wm_protocols, self.atoms.wm_delete_window) else {
            return Err(WmError::AtomIntern("WM_PROTOCOLS/WM_DELETE_WINDOW".into()));
        };
        let mut data = xlib::ClientMessageData::new();
        data.set_long(0, delete as c_long);
        data.set_long(1, xlib::CurrentTime as c_long);
        let mut event = xlib::XClientMessageEvent {
            type_: xlib::ClientMessage,
            serial: 0,
            send_event: xlib::True,
            display: self.display,
            window: w,
            message_type: wm_protocols,
            format: 32,
            data,
        };
        unsafe {
            xlib::XSendEvent(self.display, w, xlib::False, xlib::NoEventMask, &mut event as *mut _ as *mut xlib::XEvent);
        }
        Ok(())
    }

    fn kill_client(&self, w: XWindow) {
        unsafe {
            xlib::XKillClient(self.display, w);
        }
    }

    fn get_transient_for(&self, w: XWindow) -> Option<XWindow> {
        unsafe {
            let mut transient: XWindow = 0;
            if xlib::XGetTransientForHint(self.display, w, &mut transient) != 0 && transient != 0 {
                Some(transient)
            } else {
                None
            }
        }
    }

    fn get_net_wm_window_type(&self, w: XWindow) -> Vec<Atom> {
        let Some(prop) = self.atoms.net_wm_window_type else {
            return Vec::new();
        };
        unsafe {
            let mut actual_type: Atom = 0;
            let mut actual_format: c_int = 0;
            let mut n_items: c_ulong = 0;
            let mut bytes_after: c_ulong = 0;
            let mut data: *mut c_uchar = std::ptr::null_mut();
            let status = xlib::XGetWindowProperty(
                self.display,
                w,
                prop,
                0,
                64,
                xlib::False,
                xlib::XA_ATOM,
                &mut actual_type,
                &mut actual_format,
                &mut n_items,
                &mut bytes_after,
                &mut data,
            );
            if status != xlib::Success as c_int || data.is_null() {
                return Vec::new();
            }
            let atoms = std::slice::from_raw_parts(data as *const Atom, n_items as usize).to_vec();
            xlib::XFree(data as *mut c_void);
            atoms
        }
    }

    fn atoms(&self) -> &Atoms {
        &self.atoms
    }

    fn ungrab_all_keys(&self) {
        unsafe {
            xlib::XUngrabKey(self.display, xlib::AnyKey, xlib::AnyModifier, self.root);
        }
    }

    fn grab_key(&self, keycode: c_int, modmask: c_uint) {
        unsafe {
            for extra in &[0, xlib::LockMask] {
                xlib::XGrabKey(
                    self.display,
                    keycode,
                    modmask | extra,
                    self.root,
                    xlib::True,
                    xlib::GrabModeAsync,
                    xlib::GrabModeAsync,
                );
            }
        }
    }

    fn keysym_to_keycode(&self, keysym: KeySym) -> c_int {
        unsafe { xlib::XKeysymToKeycode(self.display, keysym) as c_int }
    }

    fn set_net_active_window(&self, w: Option<XWindow>) {
        let Some(prop) = self.atoms.net_active_window else {
            return;
        };
        let value = w.unwrap_or(0) as c_long;
        self.change_property_32(self.root, prop, xlib::XA_WINDOW, &[value]);
    }

    fn set_net_current_desktop(&self, idx: u32) {
        let Some(prop) = self.atoms.net_current_desktop else {
            return;
        };
        self.change_property_32(self.root, prop, xlib::XA_CARDINAL, &[idx as c_long]);
    }

    fn set_net_workarea(&self, x: i32, y: i32, w: u32, h: u32) {
        let Some(prop) = self.atoms.net_workarea else {
            return;
        };
        self.change_property_32(self.root, prop, xlib::XA_CARDINAL, &[x as c_long, y as c_long, w as c_long, h as c_long]);
    }

    fn set_net_number_of_desktops(&self, n: u32) {
        let Some(prop) = self.atoms.net_number_of_desktops else {
            return;
        };
        self.change_property_32(self.root, prop, xlib::XA_CARDINAL, &[n as c_long]);
    }

    fn set_net_wm_state_fullscreen(&self, w: XWindow, on: bool) {
        let (Some(state), Some(fullscreen)) = (self.atoms.net_wm_state, self.atoms.net_wm_state_fullscreen) else {
            return;
        };
        if on {
            self.change_property_32(w, state, xlib::XA_ATOM, &[fullscreen as c_long]);
        } else {
            self.change_property_32(w, state, xlib::XA_ATOM, &[]);
        }
    }

    fn set_net_wm_state_urgent(&self, w: XWindow, on: bool) {
        let (Some(state), Some(urgent)) = (self.atoms.net_wm_state, self.atoms.net_wm_state_demands_attention) else {
            return;
        };
        if on {
            self.change_property_32(w, state, xlib::XA_ATOM, &[urgent as c_long]);
        } else {
            self.change_property_32(w, state, xlib::XA_ATOM, &[]);
        }
    }

    fn set_supported(&self, atoms: &[Atom]) {
        let Some(prop) = self.atoms.net_supported else {
            return;
        };
        let data: Vec<c_long> = atoms.iter().map(|a| *a as c_long).collect();
        self.change_property_32(self.root, prop, xlib::XA_ATOM, &data);
    }

    fn set_desktop_geometry(&self, w: u32, h: u32) {
        let Some(prop) = self.atoms.net_desktop_geometry else {
            return;
        };
        self.change_property_32(self.root, prop, xlib::XA_CARDINAL, &[w as c_long, h as c_long]);
    }

    fn set_desktop_viewport(&self) {
        let Some(prop) = self.atoms.net_desktop_viewport else {
            return;
        };
        self.change_property_32(self.root, prop, xlib::XA_CARDINAL, &[0, 0]);
    }

    fn set_wm_name(&self, name: &str) {
        let (Some(check), Some(wm_name), Some(utf8)) = (
            self.atoms.net_supporting_wm_check,
            self.atoms.net_wm_name,
            self.atoms.utf8_string,
        ) else {
            return;
        };
        self.change_property_32(self.root, check, xlib::XA_WINDOW, &[self.root as c_long]);
        if let Ok(c_name) = CString::new(name) {
            unsafe {
                xlib::XChangeProperty(
                    self.display,
                    self.root,
                    wm_name,
                    utf8,
                    8,
                    xlib::PropModeReplace,
                    c_name.as_ptr() as *const c_uchar,
                    name.len() as c_int,
                );
            }
        }
    }

    /// Forks, detaches from the X connection in the child, `setsid`s and
    /// execs `argv`; the parent returns immediately without waiting
    /// (section 5: "the sole exception to the single-threaded contract").
    fn spawn(&self, argv: &[String]) {
        if argv.is_empty() {
            warn!("spawn called with an empty argument vector");
            return;
        }
        debug!("spawning {:?}", argv);
        unsafe {
            match libc::fork() {
                -1 => warn!("fork failed while spawning {:?}", argv),
                0 => {
                    libc::close(self.connection_fd());
                    libc::setsid();
                    let c_args: Vec<CString> = argv.iter().map(|a| CString::new(a.as_str()).unwrap()).collect();
                    let mut c_ptrs: Vec<*const std::os::raw::c_char> =
                        c_args.iter().map(|a| a.as_ptr()).collect();
                    c_ptrs.push(std::ptr::null());
                    libc::execvp(c_ptrs[0], c_ptrs.as_ptr());
                    process::exit(1);
                }
                _ => {}
            }
        }
    }
}

impl Drop for XlibConn {
    fn drop(&mut self) {
        unsafe {
            xlib::XCloseDisplay(self.display);
        }
    }
}

fn c_str_to_string(ptr: *mut std::os::raw::c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    unsafe { std::ffi::CStr::from_ptr(ptr).to_string_lossy().into_owned() }
}

/// A no-op `XConn` used by unit tests elsewhere in the crate so that
/// workspace/command/event logic can be exercised without a live X
/// connection.
#[cfg(test)]
pub mod tests {
    use super::*;

    #[derive(Default)]
    pub struct NullConn {
        pub atoms: Atoms,
    }

    impl XConn for NullConn {
        fn connection_fd(&self) -> c_int {
            -1
        }
        fn flush(&self) {}
        fn pending(&self) -> c_int {
            0
        }
        fn next_event(&self) -> XEvent {
            XEvent::Other
        }
        fn screen_size(&self) -> (u32, u32) {
            (1920, 1080)
        }
        fn root(&self) -> XWindow {
            0
        }
        fn map_window(&self, _w: XWindow) {}
        fn unmap_window(&self, _w: XWindow) {}
        fn destroy_window(&self, _w: XWindow) {}
        fn reparent_to_root(&self, _w: XWindow) {}
        fn configure_window(&self, _w: XWindow, _x: i32, _y: i32, _width: u32, _height: u32, _border_width: u32) {}
        fn configure_window_ext(
            &self,
            _w: XWindow,
            _x: Option<i32>,
            _y: Option<i32>,
            _width: Option<u32>,
            _height: Option<u32>,
            _border_width: Option<u32>,
            _sibling: Option<XWindow>,
            _stack_mode: Option<c_int>,
        ) {
        }
        fn set_border_width(&self, _w: XWindow, _width: u32) {}
        fn set_border_color(&self, _w: XWindow, _pixel: c_ulong) {}
        fn set_input_focus(&self, _w: XWindow) {}
        fn grab_button(&self, _w: XWindow) {}
        fn add_to_save_set(&self, _w: XWindow) {}
        fn select_client_input(&self, _w: XWindow) {}
        fn select_root_input(&self) {}
        fn clear_root_input(&self) {}
        fn allow_replay_pointer(&self) {}
        fn get_window_geometry(&self, _w: XWindow) -> Option<WindowGeometry> {
            None
        }
        fn get_wm_class(&self, _w: XWindow) -> Option<(String, String)> {
            None
        }
        fn is_override_redirect(&self, _w: XWindow) -> bool {
            false
        }
        fn supports_wm_delete(&self, _w: XWindow) -> bool {
            false
        }
        fn send_wm_delete(&self, _w: XWindow) -> Result<()> {
            Ok(())
        }
        fn kill_client(&self, _w: XWindow) {}
        fn get_transient_for(&self, _w: XWindow) -> Option<XWindow> {
            None
        }
        fn get_net_wm_window_type(&self, _w: XWindow) -> Vec<Atom> {
            Vec::new()
        }
        fn atoms(&self) -> &Atoms {
            &self.atoms
        }
        fn ungrab_all_keys(&self) {}
        fn grab_key(&self, _keycode: c_int, _modmask: c_uint) {}
        fn keysym_to_keycode(&self, _keysym: KeySym) -> c_int {
            0
        }
        fn set_net_active_window(&self, _w: Option<XWindow>) {}
        fn set_net_current_desktop(&self, _idx: u32) {}
        fn set_net_workarea(&self, _x: i32, _y: i32, _w: u32, _h: u32) {}
        fn set_net_number_of_desktops(&self, _n: u32) {}
        fn set_net_wm_state_fullscreen(&self, _w: XWindow, _on: bool) {}
        fn set_net_wm_state_urgent(&self, _w: XWindow, _on: bool) {}
        fn set_supported(&self, _atoms: &[Atom]) {}
        fn set_desktop_geometry(&self, _w: u32, _h: u32) {}
        fn set_desktop_viewport(&self) {}
        fn set_wm_name(&self, _name: &str) {}
        fn spawn(&self, _argv: &[String]) {}
    }
}
