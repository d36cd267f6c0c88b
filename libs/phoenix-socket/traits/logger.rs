/// Sink for the socket's protocol trace
///
/// Implement this trait to receive the same category/message pairs the
/// socket, its channels and their pushes emit while they work. The socket
/// always reports through `tracing` as well; a logger is an additional
/// consumer, not a replacement.
pub trait Logger: Send + Sync {
    /// Record one trace entry
    ///
    /// # Arguments
    /// * `category` - Emitting component (`"socket"`, `"channel"`, `"push"`)
    /// * `message` - Short description of what happened
    /// * `data` - Optional detail, usually a frame or a topic
    fn log(&self, category: &str, message: &str, data: Option<&str>);
}

impl<F> Logger for F
where
    F: Fn(&str, &str, Option<&str>) + Send + Sync,
{
    fn log(&self, category: &str, message: &str, data: Option<&str>) {
        self(category, message, data)
    }
}
