#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Not implemented")]
    Unimplemented,
    #[error("IO: {0}")]
    Io(IoError),
    #[error("FS: {0}")]
    Fs(FsError),
}

#[derive(thiserror::Error, Debug)]
pub enum IoError {
    #[error("Read-only")]
    ReadOnly,
    #[error("Device: {0}")]
    Device(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum FsError {
    #[error("Invalid argument")]
    Invalid,
    #[error("No memory")]
    NoMemory,
    #[error("Not found")]
    NotFound,
    #[error("Not a directory")]
    NotDirectory,
    #[error("Is a directory")]
    IsDirectory,
    #[error("Directory not empty")]
    NotEmpty,
    #[error("Already exists")]
    Exists,
    #[error("Name too long")]
    NameTooLong,
    #[error("No space left")]
    NoSpace,
    #[error("File too big")]
    FileTooBig,
    #[error("Busy")]
    Busy,
    #[error("Inconsistent")]
    Inconsistent,
    #[error("Index")]
    Index,
}

pub type Result<T> = core::result::Result<T, Error>;

impl From<FsError> for Error {
    fn from(value: FsError) -> Self {
        Error::Fs(value)
    }
}

impl From<IoError> for Error {
    fn from(value: IoError) -> Self {
        Error::Io(value)
    }
}
