//! Small helpers shared by the physics modules.

/// Open a profiling span that lasts until the returned guard is dropped.
///
/// Does nothing unless the `tracy` feature is enabled and a client is running.
/// The second argument names the enclosing function for readability in captures.
macro_rules! tracy_span {
    ($name:literal, $fn_name:literal) => {
        tracy_client::Client::running()
            .map(|client| client.span_alloc(Some($name), $fn_name, file!(), line!(), 0))
    };
}
pub(crate) use tracy_span;

