pub use nix::errno::Errno::{self, *};
use std::io::Error as IOError;
use std::{
    fmt::{self, Display},
    result,
};
pub type Result<T> = result::Result<T, Error>;

/// This struct is an abstraction of exceptions encountered in the code. It is
/// inspired by [`anyhow`]. It contains an `errno` field, which is useful in
/// scenarios where an errno value needs to be returned to a caller.
///
/// [`anyhow`]: https://docs.rs/anyhow/1.0.40/anyhow/
pub struct Error {
    errno: Errno,
    msg: Option<Box<dyn Display + Send + Sync + 'static>>,
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

#[allow(dead_code)]
impl Error {
    /// Create an Error with a unknown errno
    pub fn unknown() -> Self {
        Error::errno(Errno::UnknownErrno)
    }

    /// Create an Error with the specific errno
    pub fn errno(errno: Errno) -> Self {
        Error {
            errno,
            msg: None,
            source: None,
        }
    }

    /// Create an Error with the specific message
    pub fn msg<M>(msg: M) -> Self
    where
        M: Display + Send + Sync + 'static,
    {
        Error::errno_with_msg(Errno::UnknownErrno, msg)
    }

    /// Create an Error with the specific errno and message
    pub fn errno_with_msg<M>(errno: Errno, msg: M) -> Self
    where
        M: Display + Send + Sync + 'static,
    {
        Error {
            errno,
            msg: Some(Box::new(msg)),
            source: None,
        }
    }

    /// Set errno of self to a specific errno, and return this Error.
    pub fn with_errno(mut self, errno: Errno) -> Self {
        self.errno = errno;
        self
    }

    /// Set message of self to a specific message, and return this Error.
    pub fn with_msg<M>(mut self, msg: M) -> Self
    where
        M: Display + Send + Sync + 'static,
    {
        self.msg = Some(Box::new(msg));
        self
    }

    /// Get errno of this Error. If errno is not set, the default value is
    /// `UnknownErrno`.
    pub fn get_errno(&self) -> Errno {
        self.errno
    }
}

#[allow(dead_code)]
impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Error with {}({})", self.errno, self.errno as i32)?;

        if let Some(msg) = &self.msg {
            write!(f, ", msg: {}", msg)?;
        }
        if let Some(source) = &self.source {
            write!(f, ", source: {}", source)?;
        }
        Ok(())
    }
}

#[allow(dead_code)]
impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut d = f.debug_struct("Error");
        d.field("errno", &self.errno);
        match self.msg.as_ref() {
            Some(msg) => d.field("msg", &Some(format_args!("{}", msg))),
            None => d.field("msg", &Option::<()>::None),
        };
        d.field("source", &self.source).finish()
    }
}

impl std::error::Error for Error {}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.errno == other.errno
    }
}

impl From<Errno> for Error {
    fn from(errno: Errno) -> Error {
        Error::errno(errno)
    }
}

impl From<IOError> for Error {
    fn from(error: IOError) -> Error {
        Error {
            errno: match error.raw_os_error() {
                // we try to convert it to an errno
                Some(errno) => Errno::from_i32(errno),
                None => Errno::UnknownErrno,
            },
            msg: None,
            source: Some(Box::new(error)),
        }
    }
}

impl From<std::ffi::NulError> for Error {
    fn from(error: std::ffi::NulError) -> Error {
        Error {
            errno: Errno::EINVAL,
            msg: None,
            source: Some(Box::new(error)),
        }
    }
}

/// This trait is something like [`anyhow::Context`], which provides
/// `context()` to attach a message to a `Result<T, E>`. Unlike the upstream
/// `anyhow` trait, it is implemented directly per source error type we
/// actually convert from (no blanket impl: that requires nightly
/// specialization, which this crate avoids).
///
/// [`anyhow::Context`]: https://docs.rs/anyhow/1.0.40/anyhow/trait.Context.html
#[allow(dead_code)]
pub trait WithContext<T> {
    fn errno(self, errno: Errno) -> Result<T>;

    fn context<C>(self, context: C) -> Result<T>
    where
        C: Display + Send + Sync + 'static;
}

macro_rules! impl_with_context {
    ($err:ty) => {
        impl<T> WithContext<T> for result::Result<T, $err> {
            fn errno(self, errno: Errno) -> Result<T> {
                self.map_err(|error| Error::from(error).with_errno(errno))
            }

            fn context<C>(self, context: C) -> Result<T>
            where
                C: Display + Send + Sync + 'static,
            {
                self.map_err(|error| Error::from(error).with_msg(context))
            }
        }
    };
}

impl_with_context!(Error);
impl_with_context!(IOError);
impl_with_context!(Errno);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_defaults_to_unknown() {
        assert_eq!(Error::msg("oops").get_errno(), Errno::UnknownErrno);
    }

    #[test]
    fn with_errno_overrides() {
        let err = Error::msg("denied").with_errno(Errno::EACCES);
        assert_eq!(err.get_errno(), Errno::EACCES);
    }

    #[test]
    fn display_includes_message() {
        let err = Error::errno_with_msg(Errno::ENOENT, "missing file");
        assert!(format!("{}", err).contains("missing file"));
    }

    #[test]
    fn context_wraps_nix_errno() {
        let result: result::Result<(), Errno> = Err(Errno::EPERM);
        let wrapped = result.context("denying fork");
        assert!(wrapped.is_err());
        assert_eq!(wrapped.unwrap_err().get_errno(), Errno::EPERM);
    }
}
