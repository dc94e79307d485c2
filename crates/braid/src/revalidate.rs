/// Downstream cache invalidation. Mutating operations report the page path
/// they made stale; whoever owns the cached rendering decides what
/// recomputation means. The signal fires exactly once per successful
/// mutation and never on failure.
pub trait Revalidate: Send + Sync {
    fn revalidate(&self, path: &str);
}

/// Records stale paths on the log and nothing else.
pub struct LogRevalidate;

impl Revalidate for LogRevalidate {
    fn revalidate(&self, path: &str) {
        tracing::debug!(path, "path marked stale");
    }
}
