/// Get environment variable with FLOODGATE_ prefix, falling back to unprefixed version
///
/// This helper function checks for `FLOODGATE_{key}` first, then falls back to `{key}`
/// so deployments can keep using conventional names such as `REDIS_URL`.
///
/// # Examples
///
/// ```rust,ignore
/// // Checks FLOODGATE_REDIS_URL first, then REDIS_URL
/// let url = get_env_with_prefix("REDIS_URL");
/// ```
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    let non_empty = |value: &String| !value.trim().is_empty();
    std::env::var(format!("FLOODGATE_{}", key))
        .ok()
        .filter(non_empty)
        .or_else(|| std::env::var(key).ok().filter(non_empty))
}

/// Read and parse an environment variable, ignoring values that do not parse
pub fn parse_env_with_prefix<T: std::str::FromStr>(key: &str) -> Option<T> {
    let raw = get_env_with_prefix(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key = %key, value = %raw, "Ignoring unparseable environment value");
            None
        }
    }
}
