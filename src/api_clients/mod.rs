pub mod auth_client;
pub mod error_handling;
pub mod retry_policy;
pub mod session_client;
pub mod transport;

pub use auth_client::AuthApiClient;
pub use error_handling::{decode_envelope, map_status_error};
pub use retry_policy::RetryPolicy;
pub use session_client::SessionClient;
pub use transport::{ApiRequest, ApiResponse, HttpTransport, ReqwestTransport};
