//! User-facing configuration (section 0, section 4.8.1).
//!
//! One `Config` struct assembled from optional, nested table structs via
//! `serde`+`toml`, with every leaf field `Option<T>` and a hard-coded
//! default substituted at the call site rather than `#[serde(default)]`
//! boilerplate. A missing or unreadable config file degrades to
//! `Config::default()` with a logged warning instead of panicking: a
//! missing config file should never take the whole window manager down
//! with it.
//!
//! Keymap declarations proper are described only by shape here;
//! `bindings` below exists to show that shape, but the actual
//! operator/motion/direct-binding tables `fsa` dispatches on are a
//! compiled-in default, binding keys via `x11::keysym` constants rather
//! than config-driven keysym lookup.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::rules::Rule;

const DEFAULT_PATH: &str = "/etc/howm/config.toml";
const DEFAULT_SOCKET_PATH: &str = "/tmp/howm.sock";

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct Config {
    pub arrangement: ArrangementSettings,
    #[serde(alias = "rule", default)]
    pub rule: Vec<RuleSettings>,
    pub scratchpad: ScratchpadSettings,
    #[serde(alias = "binding", default)]
    pub bindings: Vec<KeySettings>,
    #[serde(alias = "command", default)]
    pub commands: Vec<CommandSettings>,
    pub socket: Option<SocketSettings>,

    #[serde(skip)]
    pub rules: Vec<Rule>,
}

/// `[arrangement]` - gaps, master-ratio, bar reservation and workspace
/// count, all optional with hard-coded fallbacks.
#[derive(Debug, Serialize, Deserialize, Default)]
pub struct ArrangementSettings {
    pub inner_gap: Option<i32>,
    pub outer_gap: Option<i32>,
    pub master_ratio: Option<f32>,
    pub bar_height: Option<u32>,
    pub bar_on_top: Option<bool>,
    pub border_width: Option<u32>,
    pub workspace_count: Option<usize>,
    /// The dedicated modifier the count state (section 4.4) requires
    /// alongside a digit keysym; carried here rather than hard-coded so a
    /// user can move it off the primary modifier. One of `Mod1`-`Mod5`,
    /// `Shift`, `Control`, `Lock` (matched case-insensitively); `fsa::Fsa`
    /// resolves this to an X modifier mask.
    pub count_modifier: Option<String>,
    /// Fallback size for a client whose initial `XGetWindowAttributes`
    /// geometry is unusable (section 4.6: "falling back to configured
    /// spawn dims").
    pub default_spawn_width: Option<u32>,
    pub default_spawn_height: Option<u32>,
    /// Whether a floating/FFT client is centred on spawn (section 4.6:
    /// "optionally centred"; scenario 6).
    pub center_floating: Option<bool>,
    pub focus_follows_mouse: Option<bool>,
    pub focus_on_click: Option<bool>,
}

/// Resolved view of `ArrangementSettings` with every field defaulted;
/// `Context::new` and `Workspace::new` read this, not the raw optional
/// struct.
#[derive(Debug, Clone)]
pub struct Arrangement {
    pub inner_gap: i32,
    pub outer_gap: u32,
    pub master_ratio: f32,
    pub bar_height: u32,
    pub bar_on_top: bool,
    pub border_width: u32,
    pub count_modifier: String,
    pub default_spawn_width: u32,
    pub default_spawn_height: u32,
    pub center_floating: bool,
    pub focus_follows_mouse: bool,
    pub focus_on_click: bool,
}

impl ArrangementSettings {
    fn resolved(&self) -> Arrangement {
        Arrangement {
            inner_gap: self.inner_gap.unwrap_or(0).max(0),
            outer_gap: self.outer_gap.unwrap_or(0).max(0) as u32,
            master_ratio: self.master_ratio.unwrap_or(0.55),
            bar_height: self.bar_height.unwrap_or(20),
            bar_on_top: self.bar_on_top.unwrap_or(true),
            border_width: self.border_width.unwrap_or(1),
            count_modifier: self.count_modifier.clone().unwrap_or_else(|| "Mod1".to_string()),
            default_spawn_width: self.default_spawn_width.unwrap_or(800),
            default_spawn_height: self.default_spawn_height.unwrap_or(600),
            center_floating: self.center_floating.unwrap_or(true),
            focus_follows_mouse: self.focus_follows_mouse.unwrap_or(false),
            focus_on_click: self.focus_on_click.unwrap_or(true),
        }
    }
}

/// One `[[rule]]` row, section 4.8: "(class-substring, workspace (0 =
/// current), follow?, floating?, fullscreen?)".
#[derive(Debug, Serialize, Deserialize)]
pub struct RuleSettings {
    pub class_substring: String,
    pub workspace: Option<usize>,
    pub follow: Option<bool>,
    pub floating: Option<bool>,
    pub fullscreen: Option<bool>,
}

/// `[scratchpad]` - fixed geometry the client is restored to by
/// get-from-scratchpad.
#[derive(Debug, Serialize, Deserialize)]
pub struct ScratchpadSettings {
    pub width: u32,
    pub height: u32,
}

impl Default for ScratchpadSettings {
    fn default() -> Self {
        ScratchpadSettings { width: 800, height: 600 }
    }
}

/// `[[binding]]` - shape only (section 1's "user-editable keymap ...
/// declarations, described only by shape"); not consulted by `fsa` at
/// runtime, but round-tripped through `serde` so a config file that
/// declares bindings is accepted rather than rejected.
#[derive(Debug, Serialize, Deserialize)]
pub struct KeySettings {
    pub name: Option<String>,
    pub keys: Option<Vec<String>>,
    pub operation: Option<String>,
}

/// `[[command]]` - named spawn strings.
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandSettings {
    pub name: Option<String>,
    pub action: Option<String>,
}

/// `[socket]` - control-socket path override (section 6).
#[derive(Debug, Serialize, Deserialize)]
pub struct SocketSettings {
    pub path: Option<String>,
}

impl Config {
    /// Read and parse `DEFAULT_PATH`, falling back to `Config::default()`
    /// with a logged warning on any I/O or parse failure.
    pub fn get_config() -> Self {
        Self::from_path(DEFAULT_PATH)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let contents = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                warn!("could not read config file {}: {} - using defaults", path.display(), e);
                return Config::default();
            }
        };
        match toml::from_str::<Config>(&contents) {
            Ok(mut cfg) => {
                cfg.rules = cfg.rule.iter().map(RuleSettings::resolve).collect();
                debug!("{:#?}", cfg);
                cfg
            }
            Err(e) => {
                warn!("malformed config file {}: {} - using defaults", path.display(), e);
                Config::default()
            }
        }
    }

    pub fn arrangement(&self) -> Arrangement {
        self.arrangement.resolved()
    }

    pub fn workspace_count(&self) -> usize {
        self.arrangement.workspace_count.unwrap_or(5).clamp(1, 9)
    }

    pub fn socket_path(&self) -> PathBuf {
        self.socket
            .as_ref()
            .and_then(|s| s.path.clone())
            .unwrap_or_else(|| DEFAULT_SOCKET_PATH.to_string())
            .into()
    }
}

impl RuleSettings {
    fn resolve(&self) -> Rule {
        Rule {
            class_substring: self.class_substring.clone(),
            workspace: self.workspace.unwrap_or(0),
            follow: self.follow.unwrap_or(false),
            floating: self.floating.unwrap_or(false),
            fullscreen: self.fullscreen.unwrap_or(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = Config::from_path("/nonexistent/path/to/howm.toml");
        assert_eq!(cfg.workspace_count(), 5);
        assert_eq!(cfg.arrangement().master_ratio, 0.55);
    }

    #[test]
    fn malformed_toml_falls_back_to_defaults() {
        let dir = std::env::temp_dir().join("howm-config-test-malformed.toml");
        fs::write(&dir, "this is not [ valid toml").unwrap();
        let cfg = Config::from_path(&dir);
        assert_eq!(cfg.workspace_count(), 5);
        let _ = fs::remove_file(&dir);
    }

    #[test]
    fn parses_rule_rows_into_resolved_rules() {
        let dir = std::env::temp_dir().join("howm-config-test-rules.toml");
        fs::write(
            &dir,
            r#"
            [[rule]]
            class_substring = "mpv"
            workspace = 2
            floating = true
            "#,
        )
        .unwrap();
        let cfg = Config::from_path(&dir);
        assert_eq!(cfg.rules.len(), 1);
        assert_eq!(cfg.rules[0].class_substring, "mpv");
        assert_eq!(cfg.rules[0].workspace, 2);
        assert!(cfg.rules[0].floating);
        assert!(!cfg.rules[0].follow);
        let _ = fs::remove_file(&dir);
    }
}
