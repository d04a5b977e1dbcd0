//! Blocking bridge from the synchronous stage API onto async I/O.

use std::{future::Future, io};

use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};

/// Owns a current-thread Tokio runtime used to drive async work from
/// synchronous callers.
///
/// When called from inside a multi-threaded runtime the caller's handle is
/// reused through [`tokio::task::block_in_place`]; outside any runtime the
/// owned runtime drives the future. Inside a `current_thread` runtime neither
/// can block, so [`BlockingRuntime::block_on`] refuses and async callers use
/// the `*_async` variants instead.
pub struct BlockingRuntime {
    runtime: Runtime,
}

impl std::fmt::Debug for BlockingRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingRuntime")
            .field("runtime", &"<tokio::runtime::Runtime>")
            .finish()
    }
}

impl BlockingRuntime {
    /// Build the owned runtime with I/O, time and process drivers enabled.
    ///
    /// # Errors
    ///
    /// Returns the I/O error reported by Tokio when the runtime cannot start.
    pub fn new() -> io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self { runtime })
    }

    /// Run `future` to completion on the most appropriate runtime.
    ///
    /// # Errors
    ///
    /// Returns [`io::ErrorKind::Unsupported`] when called from inside a
    /// runtime that cannot block, such as a `current_thread` runtime.
    pub fn block_on<F: Future>(&self, future: F) -> io::Result<F::Output> {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                Ok(tokio::task::block_in_place(|| handle.block_on(future)))
            }
            Ok(handle) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!(
                    "cannot block inside a {:?} Tokio runtime; use the async API",
                    handle.runtime_flavor()
                ),
            )),
            Err(_) => Ok(self.runtime.block_on(future)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn drives_futures_outside_a_runtime() {
        let runtime = BlockingRuntime::new().expect("runtime should build");
        assert_eq!(runtime.block_on(async { 2 + 2 }).expect("blocking allowed"), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn reuses_multi_threaded_callers() {
        let runtime = BlockingRuntime::new().expect("runtime should build");
        let value = runtime
            .block_on(async {
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                7
            })
            .expect("blocking allowed");
        assert_eq!(value, 7);
        // Dropping a runtime is a blocking operation.
        tokio::task::block_in_place(move || drop(runtime));
    }

    #[tokio::test(flavor = "current_thread")]
    async fn refuses_current_thread_callers() {
        let runtime = BlockingRuntime::new().expect("runtime should build");
        let err = runtime
            .block_on(async { 1 })
            .expect_err("current-thread runtime cannot block");
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        // Dropping a runtime inside another one panics; hand it to a thread.
        std::thread::spawn(move || drop(runtime))
            .join()
            .expect("drop runtime off the async context");
    }
}
