use std::{error, fmt, io};

#[derive(Debug)]
pub enum Error {
    WebApiError(String),
    UnexpectedResponse { status: u16 },
    InvalidStory(String),
    JsonError(Box<dyn error::Error + Send>),
    IoError(io::Error),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WebApiError(err) => f.write_str(err),
            Self::UnexpectedResponse { status } => {
                write!(f, "Unexpected server response: {status}")
            }
            Self::InvalidStory(reason) => write!(f, "Invalid story: {reason}"),
            Self::JsonError(err) => err.fmt(f),
            Self::IoError(err) => err.fmt(f),
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::IoError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::JsonError(Box::new(err))
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Error {
        match err {
            ureq::Error::StatusCode(status) => Error::UnexpectedResponse { status },
            err => Error::WebApiError(err.to_string()),
        }
    }
}
