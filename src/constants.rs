// Default fallback URL for the API server. Prefer environment variables.
pub const DEFAULT_API_BASE_URL: &str = "https://skillup-zvp9.onrender.com";

// Auth endpoints
pub const LOGIN_PATH: &str = "/api/auth/login";
pub const REGISTER_PATH: &str = "/api/auth/register";
pub const REFRESH_PATH: &str = "/api/auth/refresh";
pub const VALIDATE_PATH: &str = "/api/auth/validate";
pub const HEALTH_PATH: &str = "/api/health";

// HTTP headers
pub const HEADER_REQUEST_ID: &str = "X-Request-ID";

// Timing defaults
pub const DEFAULT_API_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_TOKEN_REFRESH_INTERVAL_MS: u64 = 2 * 60 * 1000; // 2 minutes
pub const DEFAULT_TOKEN_WARNING_TIME_MS: u64 = 5 * 60 * 1000; // 5 minutes
pub const DEFAULT_HEALTH_CHECK_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_HEALTH_CHECK_TIMEOUT_MS: u64 = 5_000;

// Retry defaults (retries are off unless configured)
pub const DEFAULT_API_MAX_RETRIES: u32 = 0;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 8_000;

// Persisted session entries
pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";

// Storage locations
pub const SERVICE_NAME_FOR_KEYRING: &str = "skillup";
pub const APP_DATA_DIR_NAME: &str = "skillup";
pub const SESSION_FILE_NAME: &str = "session.json";

// Session event channel capacity
pub const SESSION_EVENT_CHANNEL_CAPACITY: usize = 64;
