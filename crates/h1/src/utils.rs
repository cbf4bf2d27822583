//! Small helpers shared by the codec and protocol modules.

/// Returns early with `Err($error)` when `$predicate` does not hold.
///
/// Works like `assert!`, but for recoverable protocol violations: the caller gets
/// an error value instead of a panic.
///
/// # Example
///
/// ```ignore
/// ensure!(header_count <= max_headers, ParseError::too_many_headers(max_headers));
/// ```
macro_rules! ensure {
    ($predicate:expr, $error:expr) => {
        if !$predicate {
            return Err($error);
        }
    };
}

pub(crate) use ensure;

/// `io::Write` adapter that appends to a `BytesMut`, so `write!` can format
/// numbers straight into an output buffer.
pub(crate) struct FastWrite<'a>(pub(crate) &'a mut bytes::BytesMut);

impl std::io::Write for FastWrite<'_> {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.extend_from_slice(buf);
        Ok(buf.len())
    }

    #[inline]
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
