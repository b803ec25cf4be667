//! Variable substitution.
//!
//! All `{variable}` expansion goes through one [`Substitutor`]; the layout
//! engine and header renderer never inspect variable names themselves.
//! Substitution is total: unknown variables are left in place verbatim.

use crate::metrics::{format_uptime, tps_color};
use crate::viewer::ViewerContext;

/// Expands variables in a raw template for one viewer.
pub trait Substitutor: Send + Sync {
    fn substitute(&self, viewer: &ViewerContext, raw: &str) -> String;
}

/// Bundled substitutor for the built-in `{name}` variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinSubstitutor;

impl BuiltinSubstitutor {
    pub fn new() -> Self {
        Self
    }

    fn lookup(viewer: &ViewerContext, name: &str) -> Option<String> {
        let profile = &viewer.profile;
        let metrics = &viewer.metrics;
        let value = match name {
            "player" => profile.session.name.clone(),
            "displayname" => profile.display_name.clone(),
            "ping" => profile.ping_ms.to_string(),
            "world" => profile.world.clone(),
            "online" => metrics.online.to_string(),
            "max" => metrics.capacity.to_string(),
            "tps" => format!("{:.2}", metrics.tps),
            "tps_color" => tps_color(metrics.tps).to_string(),
            "uptime" => format_uptime(metrics.uptime),
            "memory_used" => metrics.memory_used_mb.to_string(),
            "memory_max" => metrics.memory_max_mb.to_string(),
            "server" => metrics.server_name.clone(),
            "version" => metrics.version.clone(),
            _ => return None,
        };
        Some(value)
    }
}

impl Substitutor for BuiltinSubstitutor {
    fn substitute(&self, viewer: &ViewerContext, raw: &str) -> String {
        let mut out = String::with_capacity(raw.len());
        let mut rest = raw;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) => {
                    let name = &after[..close];
                    match Self::lookup(viewer, name) {
                        Some(value) => out.push_str(&value),
                        None => out.push_str(&rest[open..open + close + 2]),
                    }
                    rest = &after[close + 1..];
                }
                None => {
                    out.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }

        out.push_str(rest);
        out
    }
}

/// Fill the `{count}` slot of an overflow-counter template.
///
/// The count belongs to the layout rather than to the viewer, so it is
/// expanded here before the viewer variables.
pub fn fill_count(template: &str, count: usize) -> String {
    template.replace("{count}", &count.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::ViewerSession;
    use std::time::Duration;

    fn ctx() -> ViewerContext {
        let mut ctx = ViewerContext::for_session(ViewerSession::new("Alice"));
        ctx.profile.ping_ms = 42;
        ctx.metrics.online = 7;
        ctx.metrics.capacity = 50;
        ctx.metrics.tps = 19.5;
        ctx.metrics.uptime = Duration::from_secs(65);
        ctx
    }

    #[test]
    fn test_builtin_variables() {
        let out = BuiltinSubstitutor::new().substitute(&ctx(), "{player} {ping}ms {online}/{max}");
        assert_eq!(out, "Alice 42ms 7/50");
    }

    #[test]
    fn test_tps_and_uptime() {
        let out = BuiltinSubstitutor::new().substitute(&ctx(), "{tps_color}{tps} up {uptime}");
        assert_eq!(out, "<green>19.50 up 1m 5s");
    }

    #[test]
    fn test_unknown_variable_left_as_is() {
        let out = BuiltinSubstitutor::new().substitute(&ctx(), "{nope} {player}");
        assert_eq!(out, "{nope} Alice");
    }

    #[test]
    fn test_unterminated_brace() {
        let out = BuiltinSubstitutor::new().substitute(&ctx(), "a {player");
        assert_eq!(out, "a {player");
    }

    #[test]
    fn test_fill_count() {
        assert_eq!(fill_count("...and {count} more", 3), "...and 3 more");
    }
}
