//! Key names under which resolved profile state is handed to downstream
//! processes. Values are always passed explicitly; nothing here reads the
//! process environment.

/// Name of the user (upper) profile.
pub const SEAL_UPPER_PROFILE: &str = "TORCX_UPPER_PROFILE";
/// Paths of the vendor (lower) profiles, `:`-separated.
pub const SEAL_LOWER_PROFILES: &str = "TORCX_LOWER_PROFILES";
/// Path of the resolved run profile.
pub const SEAL_RUN_PROFILE_PATH: &str = "TORCX_PROFILE_PATH";
/// Directory holding the binaries propagated from active images.
pub const SEAL_BINDIR: &str = "TORCX_BINDIR";
/// Directory archives are unpacked into at runtime.
pub const SEAL_UNPACKDIR: &str = "TORCX_UNPACKDIR";

/// Every seal key, in the order they are emitted.
pub const SEAL_KEYS: [&str; 5] = [
    SEAL_UPPER_PROFILE,
    SEAL_LOWER_PROFILES,
    SEAL_RUN_PROFILE_PATH,
    SEAL_BINDIR,
    SEAL_UNPACKDIR,
];
