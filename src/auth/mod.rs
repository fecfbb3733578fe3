pub mod file_storage;
pub mod keyring_storage;
pub mod memory_storage;
pub mod route_guard;
pub mod secure_storage_trait;
pub mod session_teardown;
pub mod token_introspection;
pub mod token_manager;
pub mod token_refresh;

pub use file_storage::FileStorage;
pub use keyring_storage::KeyringStorage;
pub use memory_storage::MemoryStorage;
pub use route_guard::RouteDecision;
pub use secure_storage_trait::SecureStorage;
pub use session_teardown::SessionTeardown;
pub use token_manager::TokenManager;
pub use token_refresh::RefreshCoordinator;
