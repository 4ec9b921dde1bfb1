//! The write + close capability shared by every layer

use logroll_core::Result;

/// A byte sink that can be closed
///
/// [`crate::Roller`] implements it over files and [`crate::AsyncWriter`]
/// implements it over another sink, so the two compose freely.
pub trait Sink: Send {
    /// Write the whole buffer, returning the number of bytes accepted
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Flush and release the underlying resource
    fn close(&mut self) -> Result<()>;
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        (**self).write(buf)
    }

    fn close(&mut self) -> Result<()> {
        (**self).close()
    }
}
