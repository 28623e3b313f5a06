//! Control-socket wire framing (section 4.5, section 6).
//!
//! The wire format proper is out of scope (section 1: "the control-socket
//! wire framing - described only at the grammar level"); this module is
//! the minimal grammar section 4.5 does pin down: a single read holding
//! null-terminated byte strings, the first naming the command and the
//! rest its arguments, replied to with one native-order `i32` status and
//! then closed.

use std::io::{Read, Write};
use std::os::unix::net::UnixListener;

use log::{trace, warn};

use crate::commands::StatusCode;
use crate::state::Context;

/// Section 6: "single-connection at a time" - oversized enough for any
/// realistic command line, small enough that a misbehaving client can't
/// make a single `read` block on partial data forever via this buffer
/// alone.
const BUFFER_SIZE: usize = 4096;

/// Split a single read's worth of bytes into null-terminated argv strings,
/// per section 6's grammar: `<cmd>\0<arg1>\0<arg2>\0...` all within one
/// read. A trailing partial (unterminated) fragment is dropped rather than
/// treated as a final argument.
fn split_argv(buf: &[u8]) -> Vec<String> {
    buf.split(|&b| b == 0)
        .filter(|s| !s.is_empty())
        .map(|s| String::from_utf8_lossy(s).into_owned())
        .collect()
}

/// Accept exactly one connection, read up to `BUFFER_SIZE`, parse and
/// dispatch the command, write back one native `i32` status, then close
/// the connection (section 4.6: "accept one connection, read up to buffer
/// size, process, reply, close").
pub fn accept_and_handle(listener: &UnixListener, ctx: &mut Context) {
    let mut stream = match listener.accept() {
        Ok((stream, _addr)) => stream,
        Err(e) => {
            warn!("control socket accept failed: {}", e);
            return;
        }
    };

    let mut buf = [0u8; BUFFER_SIZE];
    let n = match stream.read(&mut buf) {
        Ok(n) => n,
        Err(e) => {
            warn!("control socket read failed: {}", e);
            return;
        }
    };

    let status = if n == 0 {
        warn!("malformed socket command: empty request");
        StatusCode::Syntax
    } else {
        let argv = split_argv(&buf[..n]);
        match argv.split_first() {
            None => {
                warn!("malformed socket command: no command name");
                StatusCode::Syntax
            }
            Some((name, args)) => {
                trace!("socket command {:?} {:?}", name, args);
                crate::commands::dispatch(ctx, name, args)
            }
        }
    };

    let code = status as i32;
    if let Err(e) = stream.write_all(&code.to_ne_bytes()) {
        warn!("control socket reply failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_argv_separates_name_and_args() {
        let buf = b"switch_workspace\x002\x00";
        assert_eq!(split_argv(buf), vec!["switch_workspace".to_string(), "2".to_string()]);
    }

    #[test]
    fn split_argv_drops_empty_fragments() {
        let buf = b"\x00kill\x00\x00";
        assert_eq!(split_argv(buf), vec!["kill".to_string()]);
    }

    #[test]
    fn split_argv_on_empty_buffer_is_empty() {
        assert!(split_argv(b"").is_empty());
    }
}
