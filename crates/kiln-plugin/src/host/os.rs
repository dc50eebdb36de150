//! `os` module: host and user information.
//!
//! Memory, uptime and load figures come from `/proc` and are only available
//! on Linux; elsewhere those functions return a "not implemented" error.

use std::rc::Rc;

use rquickjs::{Ctx, Object, Value};

use super::{HostError, HostFn, HostResult, HostState, build_module, to_js};

#[cfg(windows)]
const EOL: &str = "\r\n";
#[cfg(not(windows))]
const EOL: &str = "\n";

const FUNCTIONS: &[(&str, HostFn)] = &[
    ("arch", arch),
    ("platform", platform),
    ("type", os_type),
    ("release", release),
    ("hostname", hostname),
    ("homedir", homedir),
    ("tmpdir", tmpdir),
    ("uptime", uptime),
    ("freemem", freemem),
    ("totalmem", totalmem),
    ("loadavg", loadavg),
    ("endianness", endianness),
    ("availableParallelism", available_parallelism),
    ("machine", machine),
    ("userInfo", user_info),
];

pub(crate) fn module<'js>(ctx: &Ctx<'js>, state: &Rc<HostState>) -> rquickjs::Result<Object<'js>> {
    let module = build_module(ctx, state, FUNCTIONS)?;
    module.set("EOL", EOL)?;
    Ok(module)
}

/// Architecture name in the conventional JavaScript spelling.
pub(crate) fn arch_name() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "x64",
        "x86" => "ia32",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64",
        other => other,
    }
}

/// Platform name in the conventional JavaScript spelling.
pub(crate) fn platform_name() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "win32",
        other => other,
    }
}

fn arch<'js>(ctx: &Ctx<'js>, _: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
    to_js(ctx, arch_name())
}

fn platform<'js>(ctx: &Ctx<'js>, _: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
    to_js(ctx, platform_name())
}

fn os_type<'js>(ctx: &Ctx<'js>, _: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
    to_js(ctx, uname::sysname()?)
}

fn release<'js>(ctx: &Ctx<'js>, _: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
    to_js(ctx, uname::release()?)
}

fn machine<'js>(ctx: &Ctx<'js>, _: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
    to_js(ctx, uname::machine()?)
}

fn hostname<'js>(ctx: &Ctx<'js>, _: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
    let name = hostname::get().map_err(|e| HostError::value(e.to_string()))?;
    to_js(ctx, name.to_string_lossy().into_owned())
}

fn homedir<'js>(ctx: &Ctx<'js>, _: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
    let home = dirs::home_dir().ok_or_else(|| HostError::value("home directory is unknown"))?;
    to_js(ctx, home.display().to_string())
}

fn tmpdir<'js>(ctx: &Ctx<'js>, _: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
    to_js(ctx, std::env::temp_dir().display().to_string())
}

fn uptime<'js>(ctx: &Ctx<'js>, _: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
    to_js(ctx, procfs::uptime()?)
}

fn freemem<'js>(ctx: &Ctx<'js>, _: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
    to_js(ctx, procfs::meminfo("MemAvailable")? as f64)
}

fn totalmem<'js>(ctx: &Ctx<'js>, _: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
    to_js(ctx, procfs::meminfo("MemTotal")? as f64)
}

fn loadavg<'js>(ctx: &Ctx<'js>, _: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
    to_js(ctx, procfs::loadavg()?)
}

fn endianness<'js>(ctx: &Ctx<'js>, _: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
    to_js(ctx, if cfg!(target_endian = "little") { "LE" } else { "BE" })
}

fn available_parallelism<'js>(ctx: &Ctx<'js>, _: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
    let count = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    to_js(ctx, count as u32)
}

#[cfg(unix)]
fn user_info<'js>(ctx: &Ctx<'js>, _: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
    use nix::unistd::{User, getgid, getuid};

    let uid = getuid();
    let user = User::from_uid(uid)
        .map_err(|e| HostError::value(e.to_string()))?
        .ok_or_else(|| HostError::value(format!("no passwd entry for uid {uid}")))?;

    let info = Object::new(ctx.clone())?;
    info.set("username", user.name)?;
    info.set("uid", uid.as_raw())?;
    info.set("gid", getgid().as_raw())?;
    info.set("homedir", user.dir.display().to_string())?;
    info.set("shell", user.shell.display().to_string())?;
    Ok(info.into_value())
}

#[cfg(not(unix))]
fn user_info<'js>(_: &Ctx<'js>, _: &HostState, _: &[Value<'js>]) -> HostResult<'js> {
    Err(HostError::not_implemented())
}

#[cfg(unix)]
mod uname {
    use std::ffi::OsStr;

    use nix::sys::utsname::{UtsName, uname};

    use super::HostError;

    fn read(field: fn(&UtsName) -> &OsStr) -> Result<String, HostError> {
        let info = uname().map_err(|e| HostError::value(e.to_string()))?;
        Ok(field(&info).to_string_lossy().into_owned())
    }

    pub fn sysname() -> Result<String, HostError> {
        read(UtsName::sysname)
    }

    pub fn release() -> Result<String, HostError> {
        read(UtsName::release)
    }

    pub fn machine() -> Result<String, HostError> {
        read(UtsName::machine)
    }
}

#[cfg(not(unix))]
mod uname {
    use super::HostError;

    pub fn sysname() -> Result<String, HostError> {
        Err(HostError::not_implemented())
    }

    pub fn release() -> Result<String, HostError> {
        Err(HostError::not_implemented())
    }

    pub fn machine() -> Result<String, HostError> {
        Err(HostError::not_implemented())
    }
}

/// Readers for the Linux `/proc` filesystem.
pub(crate) mod procfs {
    use super::HostError;

    #[cfg(target_os = "linux")]
    fn read(path: &str) -> Result<String, HostError> {
        std::fs::read_to_string(path).map_err(|e| HostError::io(path, e))
    }

    #[cfg(not(target_os = "linux"))]
    fn read(_: &str) -> Result<String, HostError> {
        Err(HostError::not_implemented())
    }

    fn malformed(path: &str) -> HostError {
        HostError::value(format!("{path}: unexpected format"))
    }

    /// Seconds since boot.
    pub fn uptime() -> Result<f64, HostError> {
        let contents = read("/proc/uptime")?;
        contents
            .split_whitespace()
            .next()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| malformed("/proc/uptime"))
    }

    /// A `/proc/meminfo` field in bytes.
    pub fn meminfo(field: &str) -> Result<u64, HostError> {
        let contents = read("/proc/meminfo")?;
        parse_kib_field(&contents, field)
            .map(|kib| kib * 1024)
            .ok_or_else(|| malformed("/proc/meminfo"))
    }

    /// The 1, 5 and 15 minute load averages.
    pub fn loadavg() -> Result<Vec<f64>, HostError> {
        let contents = read("/proc/loadavg")?;
        let averages: Vec<f64> = contents
            .split_whitespace()
            .take(3)
            .filter_map(|s| s.parse().ok())
            .collect();
        if averages.len() == 3 {
            Ok(averages)
        } else {
            Err(malformed("/proc/loadavg"))
        }
    }

    /// Resident set size of this process in bytes.
    pub fn rss() -> Result<u64, HostError> {
        let contents = read("/proc/self/status")?;
        parse_kib_field(&contents, "VmRSS")
            .map(|kib| kib * 1024)
            .ok_or_else(|| malformed("/proc/self/status"))
    }

    /// Parse `Name:   1234 kB` lines.
    pub(crate) fn parse_kib_field(contents: &str, field: &str) -> Option<u64> {
        contents.lines().find_map(|line| {
            let (name, rest) = line.split_once(':')?;
            if name.trim() != field {
                return None;
            }
            rest.split_whitespace().next()?.parse().ok()
        })
    }
}
