//! Rule engine (section 4.8). Scratchpad attach/detach lives on
//! `state::Context` since it needs the whole workspace array; this module
//! is just the class-substring match that runs once, at client creation.

use crate::client::{Client, ClientFlags};

/// One rule row: `(class-substring, workspace (0 = current), follow?,
/// floating?, fullscreen?)`, per section 4.8. `workspace` is 1-based here
/// (0 means "current") to match the socket's `move_to_workspace` argument
/// convention; `apply` translates it to the crate's internal 0-based
/// workspace index.
#[derive(Debug, Clone)]
pub struct Rule {
    pub class_substring: String,
    pub workspace: usize,
    pub follow: bool,
    pub floating: bool,
    pub fullscreen: bool,
}

/// Find the first rule whose substring occurs in either the instance or
/// class half of `WM_CLASS`, apply its flags to `client` in place, and
/// return the 0-based target workspace and whether focus should follow.
/// A client with no matching rule stays on `current_workspace` and does
/// not follow.
pub fn apply(rules: &[Rule], client: &mut Client, current_workspace: usize) -> (usize, bool) {
    let Some(rule) = rules
        .iter()
        .find(|r| client.name.contains(&r.class_substring) || client.class.contains(&r.class_substring))
    else {
        return (current_workspace, false);
    };

    if rule.floating {
        client.flags.insert(ClientFlags::FLOATING);
    }
    if rule.fullscreen {
        client.flags.insert(ClientFlags::FULLSCREEN);
    }

    let target = if rule.workspace == 0 {
        current_workspace
    } else {
        rule.workspace.saturating_sub(1)
    };
    (target, rule.follow)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(class: &str) -> Client {
        let mut c = Client::new(1, String::new(), class.to_string(), 0, 1);
        c.class = class.to_string();
        c
    }

    #[test]
    fn no_matching_rule_keeps_current_workspace_and_no_follow() {
        let (ws, follow) = apply(&[], &mut client("xterm"), 3);
        assert_eq!(ws, 3);
        assert!(!follow);
    }

    #[test]
    fn matching_rule_moves_workspace_and_applies_flags() {
        let rules = vec![Rule {
            class_substring: "mpv".into(),
            workspace: 2,
            follow: true,
            floating: true,
            fullscreen: false,
        }];
        let mut c = client("mpv");
        let (ws, follow) = apply(&rules, &mut c, 0);
        assert_eq!(ws, 1);
        assert!(follow);
        assert!(c.flags.contains(ClientFlags::FLOATING));
    }

    #[test]
    fn rule_workspace_zero_means_current() {
        let rules = vec![Rule {
            class_substring: "dialog".into(),
            workspace: 0,
            follow: false,
            floating: true,
            fullscreen: false,
        }];
        let mut c = client("dialog");
        let (ws, _) = apply(&rules, &mut c, 4);
        assert_eq!(ws, 4);
    }
}
