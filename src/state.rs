//! `Context`: the single global-state struct threaded through every
//! handler (section 9 design note: "global mutable state ... should be
//! collected into one context object"). Cross-workspace operations that
//! section 4.2 and 4.7 describe - switch, move-to-workspace, cut, paste,
//! scratchpad - live here because they need the whole workspace array at
//! once; single-workspace operations stay on `Workspace` itself.

use log::{info, warn};

use crate::client::{Client, ClientFlags};
use crate::commands::{MotionType, Replay};
use crate::config::Config;
use crate::delete_register::DeleteRegister;
use crate::error::{Result, WmError};
use crate::ewmh;
use crate::layout::{LayoutKind, ScreenGeometry};
use crate::rules;
use crate::workspace::Workspace;
use crate::xconn::{XConn, XWindow};

pub struct Context {
    pub conn: Box<dyn XConn>,
    pub config: Config,
    pub workspaces: Vec<Workspace>,
    pub current_workspace: usize,
    pub last_workspace: usize,
    pub previous_layout: LayoutKind,
    pub scratchpad: Option<Client>,
    pub delete_register: DeleteRegister,
    pub replay: Replay,
    pub running: bool,
    pub exit_code: i32,
}

impl Context {
    pub fn new(conn: Box<dyn XConn>, config: Config) -> Self {
        let count = config.workspace_count();
        let arrangement = config.arrangement();
        let workspaces = (0..count)
            .map(|_| {
                let mut ws = Workspace::new(
                    arrangement.inner_gap,
                    arrangement.master_ratio,
                    arrangement.bar_height,
                    arrangement.border_width,
                );
                ws.bar_on_top = arrangement.bar_on_top;
                ws.outer_gap = arrangement.outer_gap;
                ws
            })
            .collect();
        Context {
            conn,
            config,
            workspaces,
            current_workspace: 0,
            last_workspace: 0,
            previous_layout: LayoutKind::default(),
            scratchpad: None,
            delete_register: DeleteRegister::new(8),
            replay: Replay::None,
            running: true,
            exit_code: 0,
        }
    }

    pub fn current_workspace_mut(&mut self) -> &mut Workspace {
        &mut self.workspaces[self.current_workspace]
    }

    fn screen_geometry_for(&self, idx: usize) -> ScreenGeometry {
        let (w, h) = self.conn.screen_size();
        let ws = &self.workspaces[idx];
        let bar_height = if ws.has_fullscreen() { 0 } else { ws.bar_height };
        ScreenGeometry {
            width: w,
            height: h,
            bar_height,
            bar_on_top: ws.bar_on_top,
            outer_gap: ws.outer_gap,
        }
    }

    pub fn relayout_current(&mut self) {
        self.relayout_workspace(self.current_workspace);
    }

    pub(crate) fn relayout_workspace(&mut self, idx: usize) {
        let (w, h) = self.conn.screen_size();
        self.workspaces[idx].relayout(self.conn.as_ref(), w, h);
    }

    pub fn set_current_layout(&mut self, layout: LayoutKind) {
        self.previous_layout = self.workspaces[self.current_workspace].layout;
        self.workspaces[self.current_workspace].set_layout(layout);
        self.relayout_current();
    }

    /// *switch(i)*, section 4.2: no-op if `i` equals the current workspace
    /// or is out of range; otherwise maps the target, unmaps the old
    /// current, records `last`, re-focuses, and propagates EWMH.
    pub fn switch(&mut self, target: usize) {
        if target == self.current_workspace || target >= self.workspaces.len() {
            return;
        }
        self.workspaces[target].map_all(self.conn.as_ref());
        self.workspaces[self.current_workspace].unmap_all(self.conn.as_ref());
        self.last_workspace = self.current_workspace;
        self.current_workspace = target;

        if let Some(w) = self.workspaces[target].current {
            self.conn.set_input_focus(w);
        }
        let screen = self.screen_geometry_for(target);
        ewmh::on_workspace_switch(self.conn.as_ref(), target as u32, screen);
        info!("switched to workspace {}", target + 1);
    }

    /// *move client c to workspace j (follow?)*, section 4.2. `c` is the
    /// current workspace's current client; a no-op if there is none.
    pub fn move_client_to_workspace(&mut self, target: usize, follow: bool) -> Result<()> {
        if target >= self.workspaces.len() {
            return Err(WmError::InvalidWorkspace(target));
        }
        if target == self.current_workspace {
            return Ok(());
        }
        let cw = self.current_workspace;
        let Some(window) = self.workspaces[cw].current else {
            return Ok(());
        };
        let Some(client) = self.workspaces[cw].clients.unlink(window) else {
            return Ok(());
        };
        self.workspaces[cw].focus_predecessor_of(self.conn.as_ref(), window);
        self.workspaces[target].append(client);

        if follow {
            self.switch(target);
        } else {
            self.conn.unmap_window(window);
        }
        self.relayout_workspace(cw);
        self.relayout_workspace(target);
        Ok(())
    }

    /// Cross-workspace unlink used by destroy-notify/unmap-notify handlers,
    /// which only have a window id and don't know which workspace (or the
    /// scratchpad) currently owns it (section 4.1: "unlink by scanning all
    /// workspaces - the delete path does not assume caller knows the
    /// workspace").
    pub fn unlink_anywhere(&mut self, window: XWindow) -> Option<Client> {
        if let Some(c) = &self.scratchpad {
            if c.window == window {
                return self.scratchpad.take();
            }
        }
        for (idx, ws) in self.workspaces.iter_mut().enumerate() {
            if let Some(client) = ws.clients.unlink(window) {
                ws.focus_predecessor_of(self.conn.as_ref(), window);
                self.relayout_workspace_after_unlink(idx);
                return Some(client);
            }
        }
        None
    }

    fn relayout_workspace_after_unlink(&mut self, idx: usize) {
        self.relayout_workspace(idx);
    }

    /// *Cut*, section 4.7, parameterised by (motion-type, count). Type
    /// `Client` degenerates to the workspace case when `count` is at
    /// least the current workspace's client count.
    pub fn cut(&mut self, motion_type: MotionType, count: u8) -> Result<()> {
        match motion_type {
            MotionType::Workspace => self.cut_workspaces(count),
            MotionType::Client => {
                let cw = self.current_workspace;
                if count as usize >= self.workspaces[cw].client_count() {
                    self.cut_workspaces(1)
                } else {
                    self.cut_clients(count)
                }
            }
        }
    }

    fn cut_workspaces(&mut self, count: u8) -> Result<()> {
        let count = count as usize;
        if self.delete_register.len() + count > self.delete_register.capacity() {
            return Err(WmError::DeleteRegisterFull);
        }
        let cw = self.current_workspace;
        let n = self.workspaces.len();
        for i in 0..count {
            let idx = (cw + i) % n;
            self.workspaces[idx].unmap_all(self.conn.as_ref());
            let sublist = std::mem::take(&mut self.workspaces[idx].clients).into_vec();
            self.workspaces[idx].current = None;
            self.workspaces[idx].previous_focus = None;
            self.delete_register.push(sublist)?;
        }
        info!("cut {} workspace(s) onto the delete register", count);
        Ok(())
    }

    fn cut_clients(&mut self, count: u8) -> Result<()> {
        if self.delete_register.is_full() {
            return Err(WmError::DeleteRegisterFull);
        }
        let cw = self.current_workspace;
        let Some(current) = self.workspaces[cw].current else {
            return Ok(());
        };
        let Some(start_idx) = self.workspaces[cw].clients.index_of(current) else {
            return Ok(());
        };

        let mut idx = start_idx;
        let mut windows = Vec::with_capacity(count as usize);
        for _ in 0..count {
            windows.push(self.workspaces[cw].clients[idx].window);
            idx = self.workspaces[cw].clients.next_with_wrap(idx);
        }

        let predecessor = self.workspaces[cw].clients.predecessor(current).map(|c| c.window);

        let mut cut = Vec::with_capacity(windows.len());
        for w in &windows {
            self.conn.unmap_window(*w);
            if let Some(c) = self.workspaces[cw].clients.unlink(*w) {
                cut.push(c);
            }
        }
        self.delete_register.push(cut)?;

        let replacement = predecessor
            .filter(|w| self.workspaces[cw].clients.get(*w).is_some())
            .or_else(|| self.workspaces[cw].clients.head().map(|c| c.window));
        self.workspaces[cw].focus(self.conn.as_ref(), replacement);
        self.relayout_workspace(cw);
        info!("cut {} client(s) onto the delete register", windows.len());
        Ok(())
    }

    /// *Paste*, section 4.7: pop one sublist and splice it in after the
    /// current client (head if the workspace is empty, tail if current is
    /// the last client), mapping every window and re-focusing the last
    /// pasted client.
    pub fn paste(&mut self) -> Result<()> {
        let sublist = self.delete_register.pop()?;
        if sublist.is_empty() {
            return Ok(());
        }
        let cw = self.current_workspace;
        let insert_at = match self.workspaces[cw].current {
            None => 0,
            Some(current) => self.workspaces[cw]
                .clients
                .index_of(current)
                .map(|i| i + 1)
                .unwrap_or_else(|| self.workspaces[cw].clients.len()),
        };

        let windows: Vec<XWindow> = sublist.iter().map(|c| c.window).collect();
        let last = *windows.last().expect("checked non-empty above");
        self.workspaces[cw].clients.splice_in(insert_at, sublist);

        for w in &windows {
            self.conn.map_window(*w);
        }
        self.workspaces[cw].focus(self.conn.as_ref(), Some(last));
        self.relayout_workspace(cw);
        info!("pasted {} client(s) from the delete register", windows.len());
        Ok(())
    }

    /// send-to-scratchpad, section 4.8: detaches the current client,
    /// unmaps it, and stores it. Refused if the slot is occupied.
    pub fn send_to_scratchpad(&mut self) -> Result<()> {
        if self.scratchpad.is_some() {
            return Err(WmError::ScratchpadOccupied);
        }
        let cw = self.current_workspace;
        let Some(current) = self.workspaces[cw].current else {
            return Ok(());
        };
        let Some(client) = self.workspaces[cw].clients.unlink(current) else {
            return Ok(());
        };
        self.conn.unmap_window(current);
        self.workspaces[cw].focus_predecessor_of(self.conn.as_ref(), current);
        self.scratchpad = Some(client);
        self.relayout_workspace(cw);
        info!("sent client {:#x} to scratchpad", current);
        Ok(())
    }

    /// get-from-scratchpad, section 4.8: attaches the stored client as
    /// floating, at a fixed central rectangle, to the current workspace's
    /// tail.
    pub fn get_from_scratchpad(&mut self) -> Result<()> {
        let mut client = self.scratchpad.take().ok_or(WmError::ScratchpadEmpty)?;
        client.flags.insert(ClientFlags::FLOATING);

        let (screen_w, screen_h) = self.conn.screen_size();
        let w = self.config.scratchpad.width;
        let h = self.config.scratchpad.height;
        let x = (screen_w as i32 - w as i32) / 2;
        let y = (screen_h as i32 - h as i32) / 2;
        client.set_rect(x, y, w, h);

        let window = client.window;
        let cw = self.current_workspace;
        self.workspaces[cw].append(client);
        self.conn.map_window(window);
        self.relayout_workspace(cw);
        info!("restored client {:#x} from scratchpad", window);
        Ok(())
    }

    /// focus-next / focus-prev: cycle the current workspace's focus by one
    /// position, wrapping at either end.
    pub fn focus_cycle(&mut self, forward: bool) {
        let cw = self.current_workspace;
        let Some(current) = self.workspaces[cw].current else {
            return;
        };
        let Some(idx) = self.workspaces[cw].clients.index_of(current) else {
            return;
        };
        let len = self.workspaces[cw].clients.len();
        let target = if forward {
            self.workspaces[cw].clients.next_with_wrap(idx)
        } else if idx == 0 {
            len.saturating_sub(1)
        } else {
            idx - 1
        };
        let window = self.workspaces[cw].clients[target].window;
        self.workspaces[cw].focus(self.conn.as_ref(), Some(window));
    }

    /// Re-invoke whichever half of the replay record is live, without
    /// re-recording it (section 4.4: the replay command never records
    /// itself, preventing a self-reference loop).
    pub fn replay_last(&mut self) {
        match self.replay.clone() {
            Replay::None => warn!("replay invoked with nothing to repeat"),
            Replay::Command { command, arg } => {
                crate::commands::invoke(self, command, arg, false);
            }
            Replay::Triple { operator, motion_type, count } => {
                crate::commands::run_operator(self, operator, motion_type, count, false);
            }
        }
    }

    /// Apply the first matching rule (section 4.8) to a newly created
    /// client, mutating its flags in place and returning the target
    /// workspace (current, if the rule says 0, or unset) and whether focus
    /// should follow.
    pub fn apply_rules(&mut self, client: &mut Client) -> (usize, bool) {
        rules::apply(&self.config.rules, client, self.current_workspace)
    }

    /// Whether `window` is already owned by a workspace list or the
    /// scratchpad slot (section 4.6 map-request: "already managed").
    pub fn is_managed(&self, window: XWindow) -> bool {
        if let Some(c) = &self.scratchpad {
            if c.window == window {
                return true;
            }
        }
        self.workspaces.iter().any(|ws| ws.clients.get(window).is_some())
    }

    /// The workspace index owning `window`, if any is currently managing
    /// it (used by client-message handlers, which only have a window id).
    pub fn find_client_workspace(&self, window: XWindow) -> Option<usize> {
        self.workspaces.iter().position(|ws| ws.clients.get(window).is_some())
    }

    pub fn client_mut_in(&mut self, idx: usize, window: XWindow) -> Option<&mut Client> {
        self.workspaces[idx].clients.get_mut(window)
    }

    /// Derive initial geometry for a freshly mapped client (section 4.6:
    /// "read initial geometry, falling back to configured spawn dims,
    /// optionally centred"). Scenario 6: a floating client is centred at
    /// `((screen_w - w) / 2, (screen_h - bar_height - h) / 2)`, ignoring
    /// the server-reported position.
    pub fn place_new_client(&mut self, client: &mut Client, geometry: Option<(i32, i32, u32, u32)>) {
        let arrangement = self.config.arrangement();
        let (screen_w, screen_h) = self.conn.screen_size();
        let bar_height = self.workspaces[self.current_workspace].bar_height;

        let (w, h) = match geometry {
            Some((_, _, w, h)) if w > 0 && h > 0 => (w, h),
            _ => (arrangement.default_spawn_width, arrangement.default_spawn_height),
        };

        let (x, y) = if client.is_fft() && arrangement.center_floating {
            let usable_h = screen_h.saturating_sub(bar_height);
            ((screen_w as i32 - w as i32) / 2, (usable_h as i32 - h as i32) / 2)
        } else {
            geometry.map(|(x, y, _, _)| (x, y)).unwrap_or((0, 0))
        };
        client.set_rect(x, y, w, h);
    }

    /// Append a newly classified, placed, rule-applied client to
    /// `target`'s tail, mapping and focusing it if `target` is (or
    /// becomes, via `follow`) the current workspace; otherwise it stays
    /// unmapped until that workspace is switched to.
    pub fn attach_new_client(&mut self, client: Client, target: usize, follow: bool) {
        let window = client.window;
        let target = target.min(self.workspaces.len().saturating_sub(1));
        self.workspaces[target].append(client);

        if target == self.current_workspace {
            self.conn.map_window(window);
            self.workspaces[target].focus(self.conn.as_ref(), Some(window));
        } else if follow {
            self.switch(target);
        }
        self.relayout_workspace(target);
        info!("managing client {:#x} on workspace {}", window, target + 1);
    }

    /// One status line per section 6 ("Status emission"), formatted
    /// `mode:layout:workspace:fsa-state:client-count` and logged rather
    /// than written to a dedicated file (section 0: ambient logging
    /// carries this concern).
    pub fn emit_status(&self, fsa_state: &str) {
        let ws = &self.workspaces[self.current_workspace];
        info!(
            "status normal:{:?}:{}:{}:{}",
            ws.layout,
            self.current_workspace + 1,
            fsa_state,
            ws.client_count()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::Client;
    use crate::config::Config;
    use crate::xconn::tests::NullConn;

    fn ctx() -> Context {
        Context::new(Box::new(NullConn::default()), Config::default())
    }

    fn client(w: XWindow) -> Client {
        Client::new(w, String::new(), String::new(), 0, 1)
    }

    #[test]
    fn switch_is_idempotent_and_tracks_last() {
        let mut c = ctx();
        assert_eq!(c.current_workspace, 0);
        c.switch(0);
        assert_eq!(c.current_workspace, 0);
        assert_eq!(c.last_workspace, 0);

        c.switch(1);
        assert_eq!(c.current_workspace, 1);
        assert_eq!(c.last_workspace, 0);

        c.switch(0);
        assert_eq!(c.current_workspace, 0);
        assert_eq!(c.last_workspace, 1);
    }

    #[test]
    fn switch_out_of_range_is_a_no_op() {
        let mut c = ctx();
        let n = c.workspaces.len();
        c.switch(n + 5);
        assert_eq!(c.current_workspace, 0);
    }

    #[test]
    fn cut_then_paste_preserves_client_count() {
        let mut c = ctx();
        c.workspaces[0].append(client(1));
        c.workspaces[0].append(client(2));
        c.workspaces[0].append(client(3));

        c.cut(MotionType::Client, 1).unwrap();
        assert_eq!(c.workspaces[0].client_count(), 2);
        assert_eq!(c.delete_register.len(), 1);

        c.paste().unwrap();
        assert_eq!(c.workspaces[0].client_count(), 3);
        assert_eq!(c.delete_register.len(), 0);
    }

    #[test]
    fn cut_client_count_at_least_workspace_size_degenerates_to_workspace_cut() {
        let mut c = ctx();
        c.workspaces[0].append(client(1));
        c.workspaces[0].append(client(2));
        c.workspaces[0].append(client(3));

        c.cut(MotionType::Client, 3).unwrap();
        assert_eq!(c.workspaces[0].client_count(), 0);
        assert!(c.workspaces[0].current.is_none());
        assert_eq!(c.delete_register.len(), 1);
    }

    #[test]
    fn scratchpad_round_trip() {
        let mut c = ctx();
        c.workspaces[0].append(client(1));
        c.send_to_scratchpad().unwrap();
        assert_eq!(c.workspaces[0].client_count(), 0);
        assert!(c.scratchpad.is_some());

        c.get_from_scratchpad().unwrap();
        assert_eq!(c.workspaces[0].client_count(), 1);
        assert!(c.scratchpad.is_none());
    }

    #[test]
    fn send_to_scratchpad_refuses_when_occupied() {
        let mut c = ctx();
        c.workspaces[0].append(client(1));
        c.workspaces[0].append(client(2));
        c.send_to_scratchpad().unwrap();
        assert!(matches!(c.send_to_scratchpad(), Err(WmError::ScratchpadOccupied)));
    }

    #[test]
    fn move_client_to_workspace_updates_both_sides() {
        let mut c = ctx();
        c.workspaces[0].append(client(1));
        c.workspaces[0].append(client(2));
        c.move_client_to_workspace(1, false).unwrap();
        assert_eq!(c.workspaces[0].client_count(), 1);
        assert_eq!(c.workspaces[1].client_count(), 1);
        assert_eq!(c.current_workspace, 0);
    }

    #[test]
    fn move_client_to_workspace_with_follow_switches() {
        let mut c = ctx();
        c.workspaces[0].append(client(1));
        c.move_client_to_workspace(1, true).unwrap();
        assert_eq!(c.current_workspace, 1);
        assert_eq!(c.workspaces[1].client_count(), 1);
    }
}
