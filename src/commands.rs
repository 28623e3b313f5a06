//! Command table, socket argument parsing and the replay record
//! (section 4.5, section 4.6 glossary "Replay record").

use log::{info, warn};

use crate::state::Context;

/// The two components of an operator invocation (section 4.4 / 4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionType {
    Workspace,
    Client,
}

/// The set of operators the input FSA can assemble a triple around.
/// Only `Cut` (bound, by convention, to a "kill" key) is specified in
/// full by section 4.7; the enum is kept open so a config-defined
/// operator can be added without reshaping the FSA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorId {
    Cut,
}

/// A tagged command argument, per the two argument-type codes that carry
/// a payload in section 4.5 ("integer" and "command"; "ignored" carries
/// none).
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    None,
    Int(i32),
    Strings(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Integer,
    Command,
    Ignored,
    /// Exactly two arguments: a decimal count and a single 'w'/'c'
    /// motion-type character, per section 4.5's description of operator
    /// commands from the socket.
    Operator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandId {
    Kill,
    Paste,
    SwitchWorkspace,
    MoveToWorkspace,
    MoveToWorkspaceFollow,
    FocusLastWorkspace,
    SetLayout,
    SetMasterRatio,
    FocusNext,
    FocusPrev,
    Spawn,
    SendToScratchpad,
    GetFromScratchpad,
    Replay,
    Quit,
    Cut,
}

#[derive(Debug, Clone, Copy)]
pub struct CommandSpec {
    pub name: &'static str,
    pub id: CommandId,
    pub arg_type: ArgType,
}

pub const BUILTIN_COMMANDS: &[CommandSpec] = &[
    CommandSpec { name: "kill", id: CommandId::Kill, arg_type: ArgType::Ignored },
    CommandSpec { name: "paste", id: CommandId::Paste, arg_type: ArgType::Ignored },
    CommandSpec { name: "switch_workspace", id: CommandId::SwitchWorkspace, arg_type: ArgType::Integer },
    CommandSpec { name: "move_to_workspace", id: CommandId::MoveToWorkspace, arg_type: ArgType::Integer },
    CommandSpec {
        name: "move_to_workspace_follow",
        id: CommandId::MoveToWorkspaceFollow,
        arg_type: ArgType::Integer,
    },
    CommandSpec { name: "focus_last_workspace", id: CommandId::FocusLastWorkspace, arg_type: ArgType::Ignored },
    CommandSpec { name: "set_layout", id: CommandId::SetLayout, arg_type: ArgType::Integer },
    CommandSpec { name: "set_master_ratio", id: CommandId::SetMasterRatio, arg_type: ArgType::Integer },
    CommandSpec { name: "focus_next", id: CommandId::FocusNext, arg_type: ArgType::Ignored },
    CommandSpec { name: "focus_prev", id: CommandId::FocusPrev, arg_type: ArgType::Ignored },
    CommandSpec { name: "spawn", id: CommandId::Spawn, arg_type: ArgType::Command },
    CommandSpec { name: "send_to_scratchpad", id: CommandId::SendToScratchpad, arg_type: ArgType::Ignored },
    CommandSpec { name: "get_from_scratchpad", id: CommandId::GetFromScratchpad, arg_type: ArgType::Ignored },
    CommandSpec { name: "replay", id: CommandId::Replay, arg_type: ArgType::Ignored },
    CommandSpec { name: "quit", id: CommandId::Quit, arg_type: ArgType::Integer },
    CommandSpec { name: "cut", id: CommandId::Cut, arg_type: ArgType::Operator },
];

/// Status codes for a socket reply, in the order enumerated in section
/// 4.5. Transmitted as a single native `i32` (section 6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum StatusCode {
    None = 0,
    Syntax = 1,
    Alloc = 2,
    NoCmd = 3,
    TooManyArgs = 4,
    TooFewArgs = 5,
    ArgNotInt = 6,
    ArgTooLarge = 7,
}

/// Either a last-command pair or a last operator-triple; exactly one is
/// live at a time (section 3 "Replay record").
#[derive(Debug, Clone)]
pub enum Replay {
    None,
    Command { command: CommandId, arg: Arg },
    Triple { operator: OperatorId, motion_type: MotionType, count: u8 },
}

impl Default for Replay {
    fn default() -> Self {
        Replay::None
    }
}

/// Parse the socket's "one- or two-digit decimal with optional leading
/// minus" integer grammar. Anything else is `ArgNotInt`.
pub fn parse_grammar_int(s: &str) -> Result<i32, StatusCode> {
    let (neg, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    if digits.is_empty() || digits.len() > 2 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(StatusCode::ArgNotInt);
    }
    let value: i32 = digits.parse().map_err(|_| StatusCode::ArgNotInt)?;
    Ok(if neg { -value } else { value })
}

fn parse_motion_type(c: &str) -> Result<MotionType, StatusCode> {
    match c {
        "w" => Ok(MotionType::Workspace),
        "c" => Ok(MotionType::Client),
        _ => Err(StatusCode::Syntax),
    }
}

/// Look up `name` in the command table and dispatch with `args`,
/// returning the status code that should be written back to the caller.
/// Unknown command names yield `NoCmd` (section 4.5); malformed or
/// mismatched arguments never panic or partially apply state.
pub fn dispatch(ctx: &mut Context, name: &str, args: &[String]) -> StatusCode {
    let Some(spec) = BUILTIN_COMMANDS.iter().find(|c| c.name == name) else {
        return StatusCode::NoCmd;
    };

    match spec.arg_type {
        ArgType::Ignored => {
            if !args.is_empty() {
                return StatusCode::TooManyArgs;
            }
            invoke(ctx, spec.id, Arg::None, true)
        }
        ArgType::Integer => {
            if args.is_empty() {
                return StatusCode::TooFewArgs;
            }
            if args.len() > 1 {
                return StatusCode::TooManyArgs;
            }
            match parse_grammar_int(&args[0]) {
                Ok(v) => invoke(ctx, spec.id, Arg::Int(v), true),
                Err(status) => status,
            }
        }
        ArgType::Command => {
            if args.is_empty() {
                return StatusCode::TooFewArgs;
            }
            invoke(ctx, spec.id, Arg::Strings(args.to_vec()), true)
        }
        ArgType::Operator => {
            if args.len() < 2 {
                return StatusCode::TooFewArgs;
            }
            if args.len() > 2 {
                return StatusCode::TooManyArgs;
            }
            let count = match parse_grammar_int(&args[0]) {
                Ok(v) => v,
                Err(status) => return status,
            };
            if !(1..=9).contains(&count) {
                return StatusCode::ArgTooLarge;
            }
            let motion_type = match parse_motion_type(&args[1]) {
                Ok(m) => m,
                Err(status) => return status,
            };
            run_operator(ctx, operator_for(spec.id), motion_type, count as u8, true)
        }
    }
}

fn operator_for(id: CommandId) -> OperatorId {
    match id {
        CommandId::Cut => OperatorId::Cut,
        other => unreachable!("{:?} is not an operator command", other),
    }
}

/// Run an operator with the given motion type and count, recording it for
/// replay unless it is itself the replay command (it never is, since
/// operators are not named `"replay"`, but the `record` flag mirrors the
/// direct-binding rule in section 4.4 uniformly).
pub fn run_operator(ctx: &mut Context, operator: OperatorId, motion_type: MotionType, count: u8, record: bool) -> StatusCode {
    match operator {
        OperatorId::Cut => match ctx.cut(motion_type, count) {
            Ok(()) => {
                if record {
                    ctx.replay = Replay::Triple { operator, motion_type, count };
                }
                StatusCode::None
            }
            Err(e) => {
                warn!("cut failed: {}", e);
                StatusCode::None
            }
        },
    }
}

/// Invoke a unary command, optionally recording it for replay (section
/// 4.4: direct bindings record themselves "unless it is the replay
/// command itself, to prevent self-reference loops").
pub fn invoke(ctx: &mut Context, id: CommandId, arg: Arg, record: bool) -> StatusCode {
    let status = match id {
        CommandId::Kill => {
            ctx.current_workspace_mut().kill_current(ctx.conn.as_ref());
            ctx.relayout_current();
            StatusCode::None
        }
        CommandId::Paste => match ctx.paste() {
            Ok(()) => StatusCode::None,
            Err(e) => {
                warn!("paste failed: {}", e);
                StatusCode::None
            }
        },
        CommandId::SwitchWorkspace => match arg {
            Arg::Int(n) if n >= 1 => {
                ctx.switch((n - 1) as usize);
                StatusCode::None
            }
            _ => StatusCode::ArgTooLarge,
        },
        CommandId::MoveToWorkspace => match arg {
            Arg::Int(n) if n >= 1 => match ctx.move_client_to_workspace((n - 1) as usize, false) {
                Ok(()) => StatusCode::None,
                Err(e) => {
                    warn!("move_to_workspace failed: {}", e);
                    StatusCode::None
                }
            },
            _ => StatusCode::ArgTooLarge,
        },
        CommandId::MoveToWorkspaceFollow => match arg {
            Arg::Int(n) if n >= 1 => match ctx.move_client_to_workspace((n - 1) as usize, true) {
                Ok(()) => StatusCode::None,
                Err(e) => {
                    warn!("move_to_workspace_follow failed: {}", e);
                    StatusCode::None
                }
            },
            _ => StatusCode::ArgTooLarge,
        },
        CommandId::FocusLastWorkspace => {
            ctx.switch(ctx.last_workspace);
            StatusCode::None
        }
        CommandId::SetLayout => match arg {
            Arg::Int(n) if (0..4).contains(&n) => {
                ctx.set_current_layout(layout_from_index(n));
                StatusCode::None
            }
            _ => StatusCode::ArgTooLarge,
        },
        CommandId::SetMasterRatio => match arg {
            Arg::Int(n) if (0..=100).contains(&n) => {
                ctx.current_workspace_mut().set_master_ratio(n as f32 / 100.0);
                ctx.relayout_current();
                StatusCode::None
            }
            _ => StatusCode::ArgTooLarge,
        },
        CommandId::FocusNext => {
            ctx.focus_cycle(true);
            StatusCode::None
        }
        CommandId::FocusPrev => {
            ctx.focus_cycle(false);
            StatusCode::None
        }
        CommandId::Spawn => match &arg {
            Arg::Strings(argv) if !argv.is_empty() => {
                ctx.conn.spawn(argv);
                StatusCode::None
            }
            _ => StatusCode::TooFewArgs,
        },
        CommandId::SendToScratchpad => match ctx.send_to_scratchpad() {
            Ok(()) => StatusCode::None,
            Err(e) => {
                warn!("send_to_scratchpad failed: {}", e);
                StatusCode::None
            }
        },
        CommandId::GetFromScratchpad => match ctx.get_from_scratchpad() {
            Ok(()) => StatusCode::None,
            Err(e) => {
                warn!("get_from_scratchpad failed: {}", e);
                StatusCode::None
            }
        },
        CommandId::Replay => {
            ctx.replay_last();
            return StatusCode::None;
        }
        CommandId::Quit => {
            ctx.running = false;
            ctx.exit_code = match arg {
                Arg::Int(n) => n,
                _ => 0,
            };
            return StatusCode::None;
        }
        CommandId::Cut => unreachable!("Cut is dispatched through run_operator"),
    };

    if record && id != CommandId::Replay {
        ctx.replay = Replay::Command { command: id, arg };
    }
    info!("{} -> {:?}", command_name(id), status);
    status
}

fn layout_from_index(n: i32) -> crate::layout::LayoutKind {
    use crate::layout::LayoutKind::*;
    match n {
        0 => Zoom,
        1 => Grid,
        2 => Hstack,
        3 => Vstack,
        _ => Zoom,
    }
}

fn command_name(id: CommandId) -> &'static str {
    BUILTIN_COMMANDS
        .iter()
        .find(|c| c.id == id)
        .map(|c| c.name)
        .unwrap_or("unknown")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grammar_int_accepts_one_or_two_digits_with_optional_minus() {
        assert_eq!(parse_grammar_int("3"), Ok(3));
        assert_eq!(parse_grammar_int("42"), Ok(42));
        assert_eq!(parse_grammar_int("-7"), Ok(-7));
        assert_eq!(parse_grammar_int("-99"), Ok(-99));
    }

    #[test]
    fn grammar_int_rejects_three_digits_or_non_digits() {
        assert_eq!(parse_grammar_int("123"), Err(StatusCode::ArgNotInt));
        assert_eq!(parse_grammar_int("abc"), Err(StatusCode::ArgNotInt));
        assert_eq!(parse_grammar_int(""), Err(StatusCode::ArgNotInt));
        assert_eq!(parse_grammar_int("-"), Err(StatusCode::ArgNotInt));
    }

    #[test]
    fn unknown_command_name_is_no_cmd() {
        assert!(BUILTIN_COMMANDS.iter().all(|c| c.name != "not_a_real_command"));
    }
}
