//! Safety Module
//!
//! Guards the destructive "delete then recreate" step of scratch directories
//! so a mistyped `--output-dir` never wipes a system or home directory.

use std::path::Path;

const DANGEROUS_DIRS: &[&str] = &[
    "/",
    "/System",
    "/usr",
    "/bin",
    "/sbin",
    "/etc",
    "/var",
    "/private",
    "/Library",
    "/Applications",
    "/Users",
    "/home",
    "/root",
    "/boot",
    "/dev",
    "/proc",
    "/sys",
    "/tmp",
    "/opt",
];

pub fn check_dangerous_directory(path: &Path) -> Result<(), String> {
    let path_str = path.to_string_lossy();
    let trimmed = if path_str.len() > 1 {
        path_str.trim_end_matches('/')
    } else {
        &path_str
    };

    if path_str.is_empty() || trimmed == "." || trimmed == ".." {
        return Err(format!(
            "🚨 DANGEROUS OPERATION BLOCKED!\n\
             ❌ Refusing to recreate '{}': it is the working directory or its parent.\n\
             💡 Point the output at a dedicated subdirectory instead.",
            path.display()
        ));
    }

    for dangerous in DANGEROUS_DIRS {
        if trimmed == *dangerous {
            return Err(format!(
                "🚨 DANGEROUS OPERATION BLOCKED!\n\
                 ❌ Target directory '{}' is a protected system directory.\n\
                 💡 Please specify a safe subdirectory instead.",
                dangerous
            ));
        }
    }

    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let components = canonical.components().count();
    let canonical_str = canonical.to_string_lossy();

    let under_home = canonical_str.starts_with("/Users/") || canonical_str.starts_with("/home/");
    if components <= 3 && under_home {
        return Err(format!(
            "🚨 DANGEROUS OPERATION BLOCKED!\n\
             ❌ Target '{}' is too close to your home directory root.\n\
             💡 Please specify a subdirectory instead.",
            path.display()
        ));
    }

    if let Ok(cwd) = std::env::current_dir() {
        if cwd.starts_with(&canonical) {
            return Err(format!(
                "🚨 DANGEROUS OPERATION BLOCKED!\n\
                 ❌ '{}' contains the current working directory.",
                path.display()
            ));
        }
    }

    Ok(())
}
