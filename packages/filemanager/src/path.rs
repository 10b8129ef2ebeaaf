use heapless::String;

use crate::{RECORD_SUFFIX, SD_PATH_MAX};

/// Absolute path on the mounted volume, e.g. `/sdcard/dev1/Firmware`.
pub type SdPath = String<SD_PATH_MAX>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PathOverflow;

/// Joins `parts` with `/`, skipping empty parts and stray separators at the seams.
pub fn join<const N: usize>(parts: &[&str]) -> Result<String<N>, PathOverflow> {
    let mut out = String::<N>::new();
    for (idx, part) in parts.iter().enumerate() {
        let part = if idx == 0 {
            part.trim_end_matches('/')
        } else {
            part.trim_matches('/')
        };
        if part.is_empty() && idx != 0 {
            continue;
        }
        if idx != 0 {
            out.push('/').map_err(|_| PathOverflow)?;
        }
        out.push_str(part).map_err(|_| PathOverflow)?;
    }
    Ok(out)
}

/// `<mount>/<name>` for folders and structural files.
pub fn entry_path(mount_point: &str, name: &str) -> Result<SdPath, PathOverflow> {
    join(&[mount_point, name])
}

/// `<mount>/<name>.txt` for record files.
pub fn record_path(mount_point: &str, name: &str) -> Result<SdPath, PathOverflow> {
    let mut path = entry_path(mount_point, name)?;
    path.push_str(RECORD_SUFFIX).map_err(|_| PathOverflow)?;
    Ok(path)
}
