use alloc::string::String;

use firstfit::AllocError;
use snafu::Snafu;
use snafu_utils::{HasLocation, Location};

/// Errors returned by [`FileSystem`](crate::FileSystem) operations.
///
/// A failed operation leaves the tree unchanged.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FsError {
    #[snafu(display("invalid path `{path}`"))]
    InvalidPath {
        path: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("`{path}`: no such file or directory"))]
    NotFound {
        path: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("`{path}`: not a directory"))]
    NotADirectory {
        path: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("`{path}`: is a directory"))]
    IsADirectory {
        path: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("`{path}`: already exists"))]
    AlreadyExists {
        path: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("`{path}`: directory not empty"))]
    DirectoryNotEmpty {
        path: String,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("`{path}`: failed to access file storage"))]
    Storage {
        path: String,
        #[snafu(implicit)]
        location: Location,
        #[snafu(source)]
        source: AllocError,
    },
}

impl HasLocation for FsError {
    fn location(&self) -> Location {
        match self {
            Self::InvalidPath { location, .. }
            | Self::NotFound { location, .. }
            | Self::NotADirectory { location, .. }
            | Self::IsADirectory { location, .. }
            | Self::AlreadyExists { location, .. }
            | Self::DirectoryNotEmpty { location, .. }
            | Self::Storage { location, .. } => *location,
        }
    }
}
