//! Build metadata baked in by build.rs.

pub fn get_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn get_build_time() -> &'static str {
    env!("BUILD_TIME")
}

pub fn get_git_hash() -> &'static str {
    env!("GIT_HASH")
}

/// Detailed version report for the `version-info` subcommand.
pub fn print_header_info() {
    println!("wirescope {}", get_version());
    println!("  Built: {}", get_build_time());
    println!("  Git:   {}", get_git_hash());
}
