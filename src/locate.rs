//! Host toolchain lookups.
//!
//! Default values for the CLI path arguments come from the build host:
//! the reference MSYS2 install, the Visual Studio installation (via the
//! bundled vswhere helper) and the Windows 10 SDK. Each lookup is
//! fallible; a failed lookup only matters when the corresponding CLI
//! argument was not given, in which case the run aborts up front.
//!
//! Registry reads go through `reg.exe query` rather than an FFI binding,
//! matching the external-tool character of the rest of the packager.

use anyhow::{Context, Result};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::process::Cmd;

/// Conventional MSYS2 install location.
const MSYS2_DEFAULT: &str = "C:\\msys64";

/// Uninstall registry subtree scanned for the MSYS2 entry.
const UNINSTALL_KEY: &str = "SOFTWARE\\Microsoft\\Windows\\CurrentVersion\\Uninstall";

/// Registry key describing the installed Windows 10 SDK.
const SDK_KEY: &str =
    "HKLM\\SOFTWARE\\WOW6432Node\\Microsoft\\Microsoft SDKs\\Windows\\v10.0";

/// PE machine id for x86-64.
const IMAGE_FILE_MACHINE_AMD64: u16 = 0x8664;

/// Locate the reference MSYS2 installation.
///
/// Checked in order: the conventional `C:\msys64` location, the
/// uninstaller registry entry ("MSYS2 64bit"), and finally PATH entries
/// containing a 64-bit `usr/bin/msys-2.0.dll` (how Chocolatey installs
/// land on PATH).
pub fn msys2_install() -> Option<PathBuf> {
    let default = PathBuf::from(MSYS2_DEFAULT);
    if default.is_dir() {
        return Some(default);
    }

    for hive in ["HKCU", "HKLM"] {
        let root = format!("{}\\{}", hive, UNINSTALL_KEY);
        if let Some(key) = find_registry_key(&root, "MSYS2 64bit") {
            if let Some(location) = registry_value(&key, "InstallLocation") {
                let path = PathBuf::from(location);
                if path.is_dir() {
                    return Some(path);
                }
            }
        }
    }

    msys2_on_path()
}

/// Scan PATH entries for an MSYS2 root by probing `usr/bin/msys-2.0.dll`.
fn msys2_on_path() -> Option<PathBuf> {
    let path_var = env::var_os("PATH")?;
    for dir in env::split_paths(&path_var) {
        let dll = dir.join("usr").join("bin").join("msys-2.0.dll");
        if !dll.is_file() {
            continue;
        }
        let Ok(bytes) = fs::read(&dll) else { continue };
        if pe_machine(&bytes) == Some(IMAGE_FILE_MACHINE_AMD64) {
            return Some(dir);
        }
    }
    None
}

/// Read the machine field from a PE image header.
///
/// Layout: u32 at 0x3c points at the `PE\0\0` signature; the machine id
/// is the u16 right after the signature.
pub fn pe_machine(bytes: &[u8]) -> Option<u16> {
    let e_lfanew = u32::from_le_bytes(bytes.get(0x3c..0x40)?.try_into().ok()?) as usize;
    let signature = bytes.get(e_lfanew..e_lfanew + 4)?;
    if signature != b"PE\0\0" {
        return None;
    }
    let machine = bytes.get(e_lfanew + 4..e_lfanew + 6)?;
    Some(u16::from_le_bytes(machine.try_into().ok()?))
}

/// Query a property of the latest Visual Studio installation (including
/// prereleases and Build Tools) via the bundled vswhere helper.
pub fn vswhere(vswhere_exe: &Path, property: &str) -> Result<String> {
    let result = Cmd::new(vswhere_exe.to_string_lossy().as_ref())
        .args(["-products", "*", "-latest", "-prerelease"])
        .args(["-format", "value", "-utf8", "-property", property])
        .error_msg("vswhere query failed")
        .run()?;
    let value = result.stdout.trim().to_string();
    if value.is_empty() {
        anyhow::bail!("vswhere returned no value for property {}", property);
    }
    Ok(value)
}

/// Locate the x64 binary directory of the installed Windows 10 SDK.
pub fn windows_sdk() -> Option<PathBuf> {
    let folder = registry_value(SDK_KEY, "InstallationFolder")?;
    let version = registry_value(SDK_KEY, "ProductVersion")?;
    Some(
        PathBuf::from(folder)
            .join("bin")
            .join(format!("{}.0", version))
            .join("x64"),
    )
}

/// Find the first registry key under `root` whose data matches `needle`.
fn find_registry_key(root: &str, needle: &str) -> Option<String> {
    let result = Cmd::new("reg.exe")
        .args(["query", root, "/s", "/f", needle, "/d"])
        .allow_fail()
        .run()
        .ok()?;
    if !result.success() {
        return None;
    }
    first_key_line(&result.stdout).map(str::to_string)
}

/// Read a single named value of a registry key.
fn registry_value(key: &str, value: &str) -> Option<String> {
    let result = Cmd::new("reg.exe")
        .args(["query", key, "/v", value])
        .allow_fail()
        .run()
        .ok()?;
    if !result.success() {
        return None;
    }
    parse_reg_value(&result.stdout, value)
}

/// First line of `reg query` output naming a key.
fn first_key_line(output: &str) -> Option<&str> {
    output
        .lines()
        .map(str::trim_end)
        .find(|line| line.starts_with("HKEY_"))
}

/// Extract a value from `reg query` output.
///
/// Value lines have the shape `    Name    REG_SZ    data`, where the
/// data may itself contain spaces.
fn parse_reg_value(output: &str, name: &str) -> Option<String> {
    for line in output.lines() {
        let line = line.trim();
        let Some(rest) = line.strip_prefix(name) else {
            continue;
        };
        let rest = rest.trim_start();
        let Some(type_end) = rest.find(char::is_whitespace) else {
            continue;
        };
        let (reg_type, data) = rest.split_at(type_end);
        if !reg_type.starts_with("REG_") {
            continue;
        }
        let data = data.trim_start();
        if !data.is_empty() {
            return Some(data.to_string());
        }
    }
    None
}

/// Read a line-oriented MSVC tools version file and resolve editbin.
///
/// The default tools version lives in
/// `VC/Auxiliary/Build/Microsoft.VCToolsVersion.default.txt` inside the
/// Visual Studio installation.
pub fn editbin_exe(msvc_path: &Path) -> Result<PathBuf> {
    let version_file = msvc_path
        .join("VC")
        .join("Auxiliary")
        .join("Build")
        .join("Microsoft.VCToolsVersion.default.txt");
    let tools_version = crate::fsutil::read_trimmed(&version_file)
        .context("reading MSVC tools version (is --msvc-path correct?)")?;

    Ok(msvc_path
        .join("VC")
        .join("Tools")
        .join("MSVC")
        .join(tools_version)
        .join("bin")
        .join("HostX64")
        .join("x64")
        .join("editbin.exe"))
}
