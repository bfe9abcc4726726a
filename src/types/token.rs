/// Shared cancellation flag of a purge run.
///
/// This is a type alias for [`tokio_util::sync::CancellationToken`]. Any
/// runner that hits a fatal error cancels it, and every other runner stops at
/// its next check. The Ctrl-C handler of the binary cancels it too.
pub type PurgeCancellationToken = tokio_util::sync::CancellationToken;

/// Create a new [`PurgeCancellationToken`].
///
/// # Example
///
/// ```
/// use ospurge_rs::create_purge_cancellation_token;
///
/// let token = create_purge_cancellation_token();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
pub fn create_purge_cancellation_token() -> PurgeCancellationToken {
    tokio_util::sync::CancellationToken::new()
}
