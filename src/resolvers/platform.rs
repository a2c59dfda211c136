use crate::protocol::PlatformResponse;

/// Answers platform requests with the host's OS name and version.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformResolver;

impl PlatformResolver {
    pub fn resolve(&self) -> PlatformResponse {
        PlatformResponse(host_identity())
    }
}

/// "<os name> <os version>", e.g. "Linux 6.8.0" or "Darwin 23.4.0".
pub fn host_identity() -> String {
    match os_name_and_release() {
        Some((name, release)) => format!("{} {}", name, release),
        None => format!("{} unknown", std::env::consts::OS),
    }
}

#[cfg(unix)]
fn os_name_and_release() -> Option<(String, String)> {
    use std::ffi::CStr;
    use std::mem::MaybeUninit;

    unsafe {
        let mut uts = MaybeUninit::<libc::utsname>::uninit();
        if libc::uname(uts.as_mut_ptr()) != 0 {
            return None;
        }
        let uts = uts.assume_init();
        let name = CStr::from_ptr(uts.sysname.as_ptr())
            .to_string_lossy()
            .into_owned();
        let release = CStr::from_ptr(uts.release.as_ptr())
            .to_string_lossy()
            .into_owned();
        Some((name, release))
    }
}

#[cfg(not(unix))]
fn os_name_and_release() -> Option<(String, String)> {
    None
}
