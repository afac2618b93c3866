//! Command-line derivation for the separation tool

use crate::types::{Device, OutputFormat, SeparationRequest};
use std::ffi::OsString;
use std::path::Path;

/// Build the tool's argument list for `request`, writing into `temp_dir`
///
/// `<input> -n <model> -o <temp_dir> [--mp3] [-d cpu] [-j N] [--shifts N]`
pub fn build_args(request: &SeparationRequest, temp_dir: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        request.input().as_os_str().to_owned(),
        "-n".into(),
        request.model().into(),
        "-o".into(),
        temp_dir.as_os_str().to_owned(),
    ];

    if request.format() == OutputFormat::Mp3 {
        args.push("--mp3".into());
    }
    if request.device() == Device::Cpu {
        args.push("-d".into());
        args.push("cpu".into());
    }
    if request.jobs() > 1 {
        args.push("-j".into());
        args.push(request.jobs().to_string().into());
    }
    if request.shifts() > 0 {
        args.push("--shifts".into());
        args.push(request.shifts().to_string().into());
    }

    args
}
