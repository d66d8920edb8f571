use uuid::Uuid;

/// Explicit per-request tenant scope: the school and its resolved academic
/// session. Passed into every use case that needs tenant data; there is no
/// ambient thread-local equivalent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TenantContext {
    pub tenant_id: Uuid,
    pub academic_session_id: Uuid,
}
