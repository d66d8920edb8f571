//! Builder for an `AppState` backed entirely by in-memory mocks, for
//! HTTP-level testing with `axum_test::TestServer`.

use std::sync::Arc;

use axum::http::HeaderValue;
use chrono::NaiveDate;
use secrecy::SecretString;
use uuid::Uuid;

use crate::{
    adapters::http::app_state::AppState,
    application::{
        context::TenantContext,
        jwt,
        use_cases::{
            access::AccessEvaluator, plan_catalog::PlanCatalog,
            subscription_lifecycle::SubscriptionLifecycle,
        },
    },
    domain::entities::subscription::SubscriptionStatus,
    infra::config::AppConfig,
    test_utils::{
        FixedClock, InMemoryPersistence, InMemoryStudentDirectory, create_test_plan,
        create_test_subscription, date,
    },
};

const TEST_JWT_SECRET: &str = "test-secret";

pub struct TestAppStateBuilder {
    persistence: Arc<InMemoryPersistence>,
    students: Arc<InMemoryStudentDirectory>,
    clock: Arc<FixedClock>,
    actor_id: Uuid,
    tenant_id: Uuid,
    academic_session_id: Uuid,
}

impl TestAppStateBuilder {
    pub fn new() -> Self {
        Self {
            persistence: Arc::new(InMemoryPersistence::new()),
            students: Arc::new(InMemoryStudentDirectory::new()),
            clock: Arc::new(FixedClock::new(date(2026, 1, 1))),
            actor_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            academic_session_id: Uuid::new_v4(),
        }
    }

    pub fn with_today(self, year: i32, month: u32, day: u32) -> Self {
        self.clock.set_today(date(year, month, day));
        self
    }

    pub fn tenant_id(&self) -> Uuid {
        self.tenant_id
    }

    fn tenant_context(&self) -> TenantContext {
        TenantContext {
            tenant_id: self.tenant_id,
            academic_session_id: self.academic_session_id,
        }
    }

    /// A bearer token for the builder's actor, scoped to its tenant.
    pub fn issue_token(&self) -> String {
        jwt::issue(
            self.actor_id,
            self.tenant_id,
            self.academic_session_id,
            &SecretString::new(TEST_JWT_SECRET.into()),
            time::Duration::hours(24),
        )
        .expect("failed to issue test token")
    }

    pub fn insert_plan(&self, name: &str, yearly_price: &str, student_cap: i32) -> Uuid {
        let plan = create_test_plan(|p| {
            p.name = name.to_string();
            p.yearly_price = yearly_price.parse().expect("invalid test price");
            p.student_cap = student_cap;
        });
        self.persistence.insert_plan(plan).id
    }

    /// An already-activated subscription for the builder's tenant.
    pub fn insert_active_subscription(&self, plan_id: Uuid, expiry: &str) -> Uuid {
        self.insert_active_subscription_for(self.tenant_id, plan_id, expiry)
    }

    /// Same, but owned by an arbitrary tenant.
    pub fn insert_active_subscription_for(
        &self,
        tenant_id: Uuid,
        plan_id: Uuid,
        expiry: &str,
    ) -> Uuid {
        let expiry = NaiveDate::parse_from_str(expiry, "%Y-%m-%d").expect("invalid test date");
        let sub = create_test_subscription(plan_id, |s| {
            s.tenant_id = tenant_id;
            s.status = SubscriptionStatus::Active;
            s.trial_end_date = None;
            s.expiry_date = Some(expiry);
        });
        self.persistence.insert_subscription(sub).id
    }

    pub fn set_student_count(&self, count: i64) {
        self.students.set_count(self.tenant_context(), count);
    }

    pub fn build(self) -> AppState {
        let config = AppConfig {
            jwt_secret: SecretString::new(TEST_JWT_SECRET.into()),
            access_token_ttl: time::Duration::hours(24),
            cors_origin: HeaderValue::from_static("http://localhost:3000"),
            bind_addr: "127.0.0.1:0".parse().expect("invalid test bind addr"),
            database_url: "postgres://unused".to_string(),
        };

        let plan_catalog = PlanCatalog::new(self.persistence.clone());
        let lifecycle = SubscriptionLifecycle::new(
            self.persistence.clone(),
            self.persistence.clone(),
            self.persistence.clone(),
            self.persistence.clone(),
            self.clock.clone(),
        );
        let access = AccessEvaluator::new(
            self.persistence.clone(),
            self.persistence,
            self.students,
            self.clock,
        );

        AppState {
            config: Arc::new(config),
            plan_catalog: Arc::new(plan_catalog),
            lifecycle: Arc::new(lifecycle),
            access: Arc::new(access),
        }
    }
}

impl Default for TestAppStateBuilder {
    fn default() -> Self {
        Self::new()
    }
}
