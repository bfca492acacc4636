use crate::error::{Error, RecursiveError};

pub trait ErrorExt {
    fn error_on_cleanup(self, occuring_error: Error) -> Self;
}

impl ErrorExt for Error {
    fn error_on_cleanup(self, occuring_error: Error) -> Self {
        Error::RecursiveErrors(Box::new(RecursiveError {
            original_error: self,
            occuring_error,
        }))
    }
}

/// Merge the result of an operation with the result of the cleanup
/// performed after it.
pub fn merge_cleanup<T>(res: Result<T, Error>, cleanup: Result<(), Error>) -> Result<T, Error> {
    #[cfg(feature = "tracing")]
    if let Err(error) = &cleanup {
        tracing::error!(?error, "cleanup failed");
    }

    match (res, cleanup) {
        (Ok(val), Ok(())) => Ok(val),
        (Ok(_), Err(err)) | (Err(err), Ok(())) => Err(err),
        (Err(original_error), Err(occuring_error)) => {
            Err(original_error.error_on_cleanup(occuring_error))
        }
    }
}
