/// Prefix of every versioned API route.
pub const API_PREFIX: &str = "/api/v0";

/// Multipart framing allowance on top of `MAX_UPLOAD_BYTES`.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Server-wide cap on in-flight requests.
pub const HTTP_CONCURRENCY_LIMIT: usize = 10_000;
