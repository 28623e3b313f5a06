//! Input finite-state automaton.
//!
//! Three states, OPERATOR/COUNT/MOTION, re-entrant (OPERATOR is both
//! initial and terminal). Keysym tables are resolved to keycodes once, at
//! startup, via `XConn::keysym_to_keycode` - matching is then done on
//! keycode, comparing `XKeysymToKeycode(...)` results against incoming
//! `XKeyEvent.keycode` rather than re-resolving a keysym on every event.
//!
//! Keymap declarations proper are described only by shape; the tables
//! built here are a compiled-in default standing in for what a full
//! implementation would read from `config::Config::bindings`.

use std::os::raw::{c_int, c_uint};

use x11::keysym::*;
use x11::xlib;

use crate::commands::{self, Arg, CommandId, MotionType, OperatorId};
use crate::config::Config;
use crate::state::Context;
use crate::xconn::XConn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsaState {
    Operator,
    Count,
    Motion,
}

struct OperatorRow {
    keycode: c_int,
    modmask: c_uint,
    operator: OperatorId,
}

struct MotionRow {
    keycode: c_int,
    modmask: c_uint,
    motion_type: MotionType,
}

struct CountDigit {
    keycode: c_int,
    digit: u8,
}

struct DirectBinding {
    keycode: c_int,
    modmask: c_uint,
    command: CommandId,
    arg: Arg,
}

/// Modifier bits ignored in every comparison (section 6: "mod-mask
/// comparison ignores numlock and caps-lock"). `Mod2Mask` is the
/// conventional NumLock binding on most keyboard layouts; there is no
/// portable way to query it without `XModifierKeymap`, so it is assumed
/// fixed, as the teacher assumes a fixed keyboard layout throughout.
const IGNORED_MODS: c_uint = xlib::LockMask as c_uint | xlib::Mod2Mask as c_uint;

fn strip_ignored_mods(state: c_uint) -> c_uint {
    state & !IGNORED_MODS
}

/// Resolve a configured modifier name (section 4.8.1's `count_modifier`) to
/// an X modifier mask. Matched case-insensitively against `Mod1`-`Mod5`,
/// `Shift`, `Control`, `Lock`; anything else falls back to `Mod1Mask` with a
/// logged warning rather than refusing to start.
fn parse_modmask(name: &str) -> c_uint {
    match name.to_ascii_lowercase().as_str() {
        "mod1" => xlib::Mod1Mask as c_uint,
        "mod2" => xlib::Mod2Mask as c_uint,
        "mod3" => xlib::Mod3Mask as c_uint,
        "mod4" => xlib::Mod4Mask as c_uint,
        "mod5" => xlib::Mod5Mask as c_uint,
        "shift" => xlib::ShiftMask as c_uint,
        "control" => xlib::ControlMask as c_uint,
        "lock" => xlib::LockMask as c_uint,
        other => {
            log::warn!("unrecognised count_modifier {:?}, falling back to Mod1", other);
            xlib::Mod1Mask as c_uint
        }
    }
}

pub struct Fsa {
    state: FsaState,
    pending_operator: Option<OperatorId>,
    count: u8,
    operators: Vec<OperatorRow>,
    motions: Vec<MotionRow>,
    count_digits: Vec<CountDigit>,
    count_modmask: c_uint,
    direct: Vec<DirectBinding>,
}

impl Fsa {
    /// Build the default binding tables, resolving each keysym to a
    /// keycode through `conn`. A keysym with no keycode on the running
    /// keyboard layout (`keysym_to_keycode` returns 0) is silently
    /// dropped from its table rather than treated as an error.
    pub fn new(conn: &dyn XConn, config: &Config) -> Self {
        let mod1 = xlib::Mod1Mask as c_uint;
        let shift = xlib::ShiftMask as c_uint;
        let kc = |sym: u32| conn.keysym_to_keycode(sym as u64);

        let operators = vec![OperatorRow { keycode: kc(XK_q), modmask: mod1, operator: OperatorId::Cut }];

        let motions = vec![
            MotionRow { keycode: kc(XK_w), modmask: mod1, motion_type: MotionType::Workspace },
            MotionRow { keycode: kc(XK_c), modmask: mod1, motion_type: MotionType::Client },
        ];

        let count_digits = [XK_1, XK_2, XK_3, XK_4, XK_5, XK_6, XK_7, XK_8, XK_9]
            .iter()
            .enumerate()
            .map(|(i, &sym)| CountDigit { keycode: kc(sym), digit: (i + 1) as u8 })
            .collect();

        let mut direct = vec![
            DirectBinding { keycode: kc(XK_Return), modmask: mod1, command: CommandId::Spawn, arg: Arg::Strings(vec!["xterm".into()]) },
            DirectBinding { keycode: kc(XK_q), modmask: mod1 | shift, command: CommandId::Quit, arg: Arg::Int(0) },
            DirectBinding { keycode: kc(XK_j), modmask: mod1, command: CommandId::FocusNext, arg: Arg::None },
            DirectBinding { keycode: kc(XK_k), modmask: mod1, command: CommandId::FocusPrev, arg: Arg::None },
            DirectBinding { keycode: kc(XK_p), modmask: mod1, command: CommandId::Paste, arg: Arg::None },
            DirectBinding { keycode: kc(XK_period), modmask: mod1, command: CommandId::Replay, arg: Arg::None },
            DirectBinding { keycode: kc(XK_Tab), modmask: mod1, command: CommandId::FocusLastWorkspace, arg: Arg::None },
        ];
        for (i, &sym) in [XK_1, XK_2, XK_3, XK_4, XK_5, XK_6, XK_7, XK_8, XK_9].iter().enumerate() {
            direct.push(DirectBinding {
                keycode: kc(sym),
                modmask: mod1,
                command: CommandId::SwitchWorkspace,
                arg: Arg::Int((i + 1) as i32),
            });
        }

        Fsa {
            state: FsaState::Operator,
            pending_operator: None,
            count: 1,
            operators,
            motions,
            count_digits,
            count_modmask: parse_modmask(&config.arrangement().count_modifier),
            direct,
        }
    }

    pub fn state(&self) -> FsaState {
        self.state
    }

    /// Every `(keycode, modmask)` this automaton or its direct bindings
    /// match on, for the startup grab pass (section 6: "grab each
    /// configured binding (and each count digit)").
    pub fn grab_table(&self) -> Vec<(c_int, c_uint)> {
        let mut grabs = Vec::new();
        grabs.extend(self.operators.iter().map(|r| (r.keycode, r.modmask)));
        grabs.extend(self.motions.iter().map(|r| (r.keycode, r.modmask)));
        grabs.extend(self.count_digits.iter().map(|d| (d.keycode, self.count_modmask)));
        grabs.extend(self.direct.iter().map(|b| (b.keycode, b.modmask)));
        grabs
    }

    /// Entry point from the key-press handler (section 2: "the input FSA
    /// is exercised only from the key-press handler"). `keycode`/`state`
    /// come straight off `XEvent::KeyPress`.
    pub fn handle_key(&mut self, ctx: &mut Context, keycode: c_uint, state: c_uint) {
        let mods = strip_ignored_mods(state);
        self.dispatch(ctx, keycode as c_int, mods);
    }

    fn dispatch(&mut self, ctx: &mut Context, keycode: c_int, mods: c_uint) {
        match self.state {
            FsaState::Operator => {
                if let Some(op) = self.match_operator(keycode, mods) {
                    self.pending_operator = Some(op);
                    self.state = FsaState::Count;
                    return;
                }
                self.try_direct_binding(ctx, keycode, mods);
            }
            FsaState::Count => {
                if mods == self.count_modmask {
                    if let Some(digit) = self.match_count_digit(keycode) {
                        self.count = digit;
                        self.state = FsaState::Motion;
                        return;
                    }
                }
                // "fall through to MOTION on any other key" (vim's "no
                // count = 1"): the same key is re-dispatched, now as a
                // candidate motion, without waiting for a fresh event.
                self.count = 1;
                self.state = FsaState::Motion;
                self.dispatch(ctx, keycode, mods);
            }
            FsaState::Motion => {
                if let Some(motion_type) = self.match_motion(keycode, mods) {
                    let operator = self.pending_operator.take().expect("MOTION state always has a pending operator");
                    let count = self.count;
                    self.count = 1;
                    self.state = FsaState::Operator;
                    commands::run_operator(ctx, operator, motion_type, count, true);
                    return;
                }
                // No motion matched: abort the triple rather than get
                // stuck waiting forever, and still give this key a chance
                // at a direct binding.
                self.pending_operator = None;
                self.count = 1;
                self.state = FsaState::Operator;
                self.try_direct_binding(ctx, keycode, mods);
            }
        }
    }

    fn match_operator(&self, keycode: c_int, mods: c_uint) -> Option<OperatorId> {
        self.operators
            .iter()
            .find(|r| r.keycode == keycode && r.modmask == mods)
            .map(|r| r.operator)
    }

    fn match_motion(&self, keycode: c_int, mods: c_uint) -> Option<MotionType> {
        self.motions
            .iter()
            .find(|r| r.keycode == keycode && r.modmask == mods)
            .map(|r| r.motion_type)
    }

    fn match_count_digit(&self, keycode: c_int) -> Option<u8> {
        self.count_digits.iter().find(|d| d.keycode == keycode).map(|d| d.digit)
    }

    fn try_direct_binding(&self, ctx: &mut Context, keycode: c_int, mods: c_uint) {
        if let Some(binding) = self.direct.iter().find(|b| b.keycode == keycode && b.modmask == mods) {
            commands::invoke(ctx, binding.command, binding.arg.clone(), true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use crate::config::Config;
    use crate::xconn::tests::NullConn;

    /// A `NullConn` whose `keysym_to_keycode` returns a distinct,
    /// deterministic keycode per keysym, so the default tables in
    /// `Fsa::new` resolve to stable, inspectable values in tests.
    #[derive(Default)]
    struct KeymapConn {
        atoms: crate::xconn::Atoms,
    }
    impl XConn for KeymapConn {
        fn connection_fd(&self) -> c_int { -1 }
        fn flush(&self) {}
        fn pending(&self) -> c_int { 0 }
        fn next_event(&self) -> crate::xconn::XEvent { crate::xconn::XEvent::Other }
        fn screen_size(&self) -> (u32, u32) { (1920, 1080) }
        fn root(&self) -> crate::xconn::XWindow { 0 }
        fn map_window(&self, _w: crate::xconn::XWindow) {}
        fn unmap_window(&self, _w: crate::xconn::XWindow) {}
        fn destroy_window(&self, _w: crate::xconn::XWindow) {}
        fn reparent_to_root(&self, _w: crate::xconn::XWindow) {}
        fn configure_window(&self, _w: crate::xconn::XWindow, _x: i32, _y: i32, _width: u32, _height: u32, _border_width: u32) {}
        fn configure_window_ext(
            &self,
            _w: crate::xconn::XWindow,
            _x: Option<i32>,
            _y: Option<i32>,
            _width: Option<u32>,
            _height: Option<u32>,
            _border_width: Option<u32>,
            _sibling: Option<crate::xconn::XWindow>,
            _stack_mode: Option<c_int>,
        ) {
        }
        fn set_border_width(&self, _w: crate::xconn::XWindow, _width: u32) {}
        fn set_border_color(&self, _w: crate::xconn::XWindow, _pixel: std::os::raw::c_ulong) {}
        fn set_input_focus(&self, _w: crate::xconn::XWindow) {}
        fn grab_button(&self, _w: crate::xconn::XWindow) {}
        fn add_to_save_set(&self, _w: crate::xconn::XWindow) {}
        fn select_client_input(&self, _w: crate::xconn::XWindow) {}
        fn select_root_input(&self) {}
        fn clear_root_input(&self) {}
        fn allow_replay_pointer(&self) {}
        fn get_window_geometry(&self, _w: crate::xconn::XWindow) -> Option<crate::xconn::WindowGeometry> { None }
        fn get_wm_class(&self, _w: crate::xconn::XWindow) -> Option<(String, String)> { None }
        fn is_override_redirect(&self, _w: crate::xconn::XWindow) -> bool { false }
        fn supports_wm_delete(&self, _w: crate::xconn::XWindow) -> bool { false }
        fn send_wm_delete(&self, _w: crate::xconn::XWindow) -> crate::error::Result<()> { Ok(()) }
        fn kill_client(&self, _w: crate::xconn::XWindow) {}
        fn get_transient_for(&self, _w: crate::xconn::XWindow) -> Option<crate::xconn::XWindow> { None }
        fn get_net_wm_window_type(&self, _w: crate::xconn::XWindow) -> Vec<crate::xconn::Atom> { Vec::new() }
        fn atoms(&self) -> &crate::xconn::Atoms {
            &self.atoms
        }
        fn ungrab_all_keys(&self) {}
        fn grab_key(&self, _keycode: c_int, _modmask: c_uint) {}
        fn keysym_to_keycode(&self, keysym: crate::xconn::KeySym) -> c_int {
            keysym as c_int
        }
        fn set_net_active_window(&self, _w: Option<crate::xconn::XWindow>) {}
        fn set_net_current_desktop(&self, _idx: u32) {}
        fn set_net_workarea(&self, _x: i32, _y: i32, _w: u32, _h: u32) {}
        fn set_net_number_of_desktops(&self, _n: u32) {}
        fn set_net_wm_state_fullscreen(&self, _w: crate::xconn::XWindow, _on: bool) {}
        fn set_net_wm_state_urgent(&self, _w: crate::xconn::XWindow, _on: bool) {}
        fn set_supported(&self, _atoms: &[crate::xconn::Atom]) {}
        fn set_desktop_geometry(&self, _w: u32, _h: u32) {}
        fn set_desktop_viewport(&self) {}
        fn set_wm_name(&self, _name: &str) {}
        fn spawn(&self, _argv: &[String]) {}
    }

    fn ctx() -> Context {
        Context::new(Box::new(NullConn::default()), Config::default())
    }

    fn client(w: crate::xconn::XWindow) -> Client {
        Client::new(w, String::new(), String::new(), 0, 1)
    }

    #[test]
    fn full_triple_invokes_operator_exactly_once() {
        let keymap = KeymapConn::default();
        let mut fsa = Fsa::new(&keymap, &Config::default());
        let mut c = ctx();
        c.workspaces[0].append(client(1));
        c.workspaces[0].append(client(2));
        c.workspaces[0].append(client(3));
        let mod1 = xlib::Mod1Mask as c_uint;

        fsa.handle_key(&mut c, XK_q as c_uint, mod1);
        assert_eq!(fsa.state(), FsaState::Count);
        fsa.handle_key(&mut c, XK_3 as c_uint, mod1);
        assert_eq!(fsa.state(), FsaState::Motion);
        fsa.handle_key(&mut c, XK_c as c_uint, mod1);
        assert_eq!(fsa.state(), FsaState::Operator);

        assert_eq!(c.workspaces[0].client_count(), 0);
        assert!(matches!(c.replay, crate::commands::Replay::Triple { count: 3, .. }));
    }

    #[test]
    fn prefix_alone_does_not_invoke() {
        let keymap = KeymapConn::default();
        let mut fsa = Fsa::new(&keymap, &Config::default());
        let mut c = ctx();
        c.workspaces[0].append(client(1));
        c.workspaces[0].append(client(2));
        let mod1 = xlib::Mod1Mask as c_uint;

        fsa.handle_key(&mut c, XK_q as c_uint, mod1);
        assert_eq!(c.workspaces[0].client_count(), 2);
        assert!(matches!(c.replay, crate::commands::Replay::None));
    }

    #[test]
    fn count_fallthrough_defaults_to_one() {
        let keymap = KeymapConn::default();
        let mut fsa = Fsa::new(&keymap, &Config::default());
        let mut c = ctx();
        c.workspaces[0].append(client(1));
        c.workspaces[0].append(client(2));
        let mod1 = xlib::Mod1Mask as c_uint;

        fsa.handle_key(&mut c, XK_q as c_uint, mod1);
        fsa.handle_key(&mut c, XK_c as c_uint, mod1); // not a digit: falls through as motion
        assert_eq!(fsa.state(), FsaState::Operator);
        assert_eq!(c.workspaces[0].client_count(), 1);
    }

    #[test]
    fn direct_binding_fires_from_operator_state() {
        let keymap = KeymapConn::default();
        let mut fsa = Fsa::new(&keymap, &Config::default());
        let mut c = ctx();
        c.workspaces[0].append(client(1));
        c.workspaces[0].append(client(2));
        let mod1 = xlib::Mod1Mask as c_uint;

        fsa.handle_key(&mut c, XK_j as c_uint, mod1);
        assert_eq!(c.workspaces[0].current, Some(1));
    }
}
