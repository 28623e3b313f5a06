#[macro_use]
extern crate log;

mod client;
mod commands;
mod config;
mod delete_register;
mod error;
mod events;
mod ewmh;
mod fsa;
mod layout;
mod rules;
mod socket;
mod state;
mod workspace;
mod xconn;

use std::os::unix::net::UnixListener;
use std::process;

use env_logger::WriteStyle::Auto;

use config::Config;
use error::WmError;
use fsa::Fsa;
use state::Context;
use xconn::{XConn, XlibConn};

/// Grab every binding the input FSA needs (section 6: "ungrab all keys on
/// the root, then grab each configured binding ... both without and with
/// the caps-lock modifier"). `XConn::grab_key` itself does the
/// with/without-caps-lock doubling; this just walks the FSA's table.
fn grab_bindings(conn: &dyn XConn, fsa: &Fsa) {
    conn.ungrab_all_keys();
    for (keycode, modmask) in fsa.grab_table() {
        if keycode == 0 {
            continue;
        }
        conn.grab_key(keycode, modmask);
    }
}

/// Bind the control socket, removing a stale socket file left behind by a
/// previous, uncleanly terminated run (section 7: "socket setup failure -
/// fatal - exit").
fn bind_socket(path: &std::path::Path) -> error::Result<UnixListener> {
    if path.exists() {
        let _ = std::fs::remove_file(path);
    }
    UnixListener::bind(path).map_err(|e| WmError::SocketSetup(e.to_string()))
}

/// Section 5 cleanup: every still-mapped top-level window receives a
/// polite delete, the root's event mask is cleared, and all key grabs are
/// released.
fn cleanup(ctx: &mut Context, socket_path: &std::path::Path) {
    for ws in &ctx.workspaces {
        for client in ws.clients.iter() {
            if ctx.conn.supports_wm_delete(client.window) {
                let _ = ctx.conn.send_wm_delete(client.window);
            } else {
                ctx.conn.kill_client(client.window);
            }
        }
    }
    if let Some(scratchpad) = ctx.scratchpad.take() {
        ctx.conn.kill_client(scratchpad.window);
    }
    ctx.conn.clear_root_input();
    ctx.conn.ungrab_all_keys();
    ctx.conn.flush();
    let _ = std::fs::remove_file(socket_path);
}

fn run() -> error::Result<i32> {
    let config = Config::get_config();
    let conn = XlibConn::open()?;
    info!("connected to X display, screen {:?}", conn.screen_size());

    conn.select_root_input();

    let socket_path = config.socket_path();
    let listener = bind_socket(&socket_path)?;
    info!("control socket listening at {}", socket_path.display());

    let mut ctx = Context::new(Box::new(conn), config);
    let mut fsa = Fsa::new(ctx.conn.as_ref(), &ctx.config);
    grab_bindings(ctx.conn.as_ref(), &fsa);

    let workspace_count = ctx.workspaces.len() as u32;
    let screen = layout::ScreenGeometry {
        width: ctx.conn.screen_size().0,
        height: ctx.conn.screen_size().1,
        bar_height: ctx.workspaces[0].bar_height,
        bar_on_top: ctx.workspaces[0].bar_on_top,
        outer_gap: ctx.workspaces[0].outer_gap,
    };
    ewmh::setup(ctx.conn.as_ref(), workspace_count, screen);
    ctx.relayout_current();
    ctx.conn.flush();

    let exit_code = events::run(&mut ctx, &mut fsa, &listener);
    cleanup(&mut ctx, &socket_path);
    Ok(exit_code)
}

fn main() {
    env_logger::builder().format_timestamp(None).write_style(Auto).init();
    info!("starting howm");

    match run() {
        Ok(code) => process::exit(code),
        Err(e) => {
            error!("fatal: {}", e);
            process::exit(1);
        }
    }
}
