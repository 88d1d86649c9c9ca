//! External tool detection

use std::path::PathBuf;

/// Install hint shown when a tool is missing.
pub fn install_hint(tool: &str) -> &'static str {
    match tool {
        "ffmpeg" | "ffprobe" => "Install with: brew install ffmpeg",
        "afinfo" | "afconvert" => "Ships with macOS (/usr/bin)",
        _ => "Install it and make sure it is on PATH",
    }
}

/// Absolute path of `tool` on PATH, if any.
pub fn locate_tool(tool: &str) -> Option<PathBuf> {
    which::which(tool).ok()
}

pub fn is_tool_available(tool: &str) -> bool {
    locate_tool(tool).is_some()
}

/// Names of the tools in `tools` that are not on PATH.
pub fn missing_tools<'a>(tools: &[&'a str]) -> Vec<&'a str> {
    tools
        .iter()
        .copied()
        .filter(|tool| !is_tool_available(tool))
        .collect()
}
