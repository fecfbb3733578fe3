pub mod connectivity_monitor;
pub mod session_manager;

pub use connectivity_monitor::{ConnectivityMonitor, ConnectivityMonitorHandle, ConnectivityStatus};
pub use session_manager::{SessionManager, SessionMonitorHandle, SessionPhase};
