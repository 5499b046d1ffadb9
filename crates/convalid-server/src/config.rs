/// Re-export `Config` from `convalid-core` for use within this crate.
///
/// Environment parsing lives in the core crate so integration tests can build
/// a config without going through the process environment.
pub use convalid_core::config::Config;
