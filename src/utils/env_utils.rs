use log::debug;
use std::env;

/// Read a variable through `lookup`, trying the bare key and the `VITE_`
/// prefixed key in the order given by `prefer_unprefixed`.
///
/// The `VITE_` fallback keeps the settings of the web build
/// (e.g. `VITE_TOKEN_WARNING_TIME`) working unchanged.
pub fn read_var_with<F>(lookup: F, key: &str, default: &str, prefer_unprefixed: bool) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let prefixed = format!("VITE_{}", key);
    let value = if prefer_unprefixed {
        lookup(key).or_else(|| lookup(&prefixed))
    } else {
        lookup(&prefixed).or_else(|| lookup(key))
    };

    let value = value.unwrap_or_else(|| default.to_string());
    debug!("Environment variable {} resolved to: {}", key, value);
    value
}

/// Read an environment variable with fallback to a default value
pub fn read_env(key: &str, default: &str, prefer_unprefixed: bool) -> String {
    read_var_with(|k| env::var(k).ok(), key, default, prefer_unprefixed)
}
