//! Core configuration

use chrono::Duration;
use uuid::Uuid;

/// Tunables and the platform-superadmin allowlist
///
/// Superadmin is the only capability that crosses tenant boundaries. It
/// is a static principal-level list, never derived from membership rows.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// User ids allowed to bypass per-workspace membership checks
    pub superadmins: Vec<Uuid>,

    /// Extra attempts after a lost conditional update before surfacing an error
    pub cas_retry_limit: u32,

    /// Age after which a PENDING issuance is eligible for the reconciliation sweep
    pub pending_sweep_max_age: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            superadmins: Vec::new(),
            cas_retry_limit: 1,
            pending_sweep_max_age: Duration::minutes(15),
        }
    }
}

impl CoreConfig {
    /// Whether the principal is on the platform-superadmin allowlist
    pub fn is_superadmin(&self, user_id: Uuid) -> bool {
        self.superadmins.contains(&user_id)
    }
}
