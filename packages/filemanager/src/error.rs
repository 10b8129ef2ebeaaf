use core::fmt;

use crate::path::PathOverflow;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileManagerError {
    /// SPI bus could not be brought up; mount was not attempted.
    InitFailed,
    /// Card answered but no usable filesystem was found.
    MountFailed,
    /// Card did not come up at all (wiring, pull-ups, no card).
    CardInitFailed,
    OpenFailed,
    WriteFailed,
    ReadFailed,
    AlreadyExists,
    CreateFailed,
    NotFound,
    RemoveFailed,
    DestinationExists,
    RenameFailed,
    PathTooLong,
    StructureFailed { entry: &'static str },
}

impl fmt::Display for FileManagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InitFailed => f.write_str("spi bus init failed"),
            Self::MountFailed => f.write_str("filesystem mount failed"),
            Self::CardInitFailed => f.write_str("card init failed"),
            Self::OpenFailed => f.write_str("file open failed"),
            Self::WriteFailed => f.write_str("file write failed"),
            Self::ReadFailed => f.write_str("file read failed"),
            Self::AlreadyExists => f.write_str("entry already exists"),
            Self::CreateFailed => f.write_str("entry create failed"),
            Self::NotFound => f.write_str("entry not found"),
            Self::RemoveFailed => f.write_str("file remove failed"),
            Self::DestinationExists => f.write_str("rename destination exists"),
            Self::RenameFailed => f.write_str("file rename failed"),
            Self::PathTooLong => f.write_str("path too long"),
            Self::StructureFailed { entry } => {
                write!(f, "device structure failed at {}", entry)
            }
        }
    }
}

impl From<PathOverflow> for FileManagerError {
    fn from(_: PathOverflow) -> Self {
        Self::PathTooLong
    }
}
