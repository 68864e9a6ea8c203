//! Integration tests for the delegate registry
//!
//! These tests verify the complete flow an embedding application goes
//! through:
//! 1. Register feature handlers at bootstrap
//! 2. Attach the registry to the session event bus
//! 3. Subscribe to the handler stream for a context
//! 4. Login/logout/config changes re-evaluate enablement

use plugboard::config::Config;
use plugboard::delegate::{
    ContextKey, DelegateRegistry, DisplayData, Handler, HandlerDisplay, HandlerError,
    StaticHandler,
};
use plugboard::events::{EventBus, SessionEvent};
use async_trait::async_trait;
use std::fs;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::time::sleep;

#[derive(Debug, Clone)]
struct UserRecord {
    id: u64,
}

fn john() -> UserRecord {
    UserRecord { id: 123 }
}

/// Shared session flag standing in for the current site's login state.
#[derive(Clone, Default)]
struct SessionGate(Arc<AtomicBool>);

impl SessionGate {
    fn set_logged_in(&self, logged_in: bool) {
        self.0.store(logged_in, Ordering::SeqCst);
    }
}

/// Handler enabled only while the session gate reports a login.
struct GatedHandler {
    name: &'static str,
    priority: i32,
    gate: SessionGate,
}

impl GatedHandler {
    fn new(name: &'static str, priority: i32, gate: &SessionGate) -> Arc<Self> {
        Arc::new(Self {
            name,
            priority,
            gate: gate.clone(),
        })
    }
}

#[async_trait]
impl Handler<UserRecord> for GatedHandler {
    fn name(&self) -> &str {
        self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    async fn is_enabled(&self, _ctx: &ContextKey) -> Result<bool, HandlerError> {
        Ok(self.gate.0.load(Ordering::SeqCst))
    }

    async fn display_data(
        &self,
        subject: &UserRecord,
        _ctx: &ContextKey,
    ) -> Result<DisplayData, HandlerError> {
        Ok(DisplayData {
            title: format!("{} ({})", self.name, subject.id),
            icon: Some(format!("icon-{}", self.name)),
            ..DisplayData::default()
        })
    }
}

fn names(list: &[HandlerDisplay]) -> Vec<String> {
    list.iter().map(|h| h.name.clone()).collect()
}

/// Opt-in pass/handler logging via `RUST_LOG=plugboard=debug`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll the stream until `check` passes or a timeout expires. Event-driven
/// invalidation is asynchronous, so assertions after an emit have to wait for
/// the listener to process the event and the pass to complete.
async fn eventually(
    rx: &watch::Receiver<Vec<HandlerDisplay>>,
    check: impl Fn(&[HandlerDisplay]) -> bool,
) {
    for _ in 0..500 {
        if check(&rx.borrow()) {
            return;
        }
        sleep(Duration::from_millis(2)).await;
    }
    panic!("stream never reached the expected state: {:?}", *rx.borrow());
}

fn user_menu_registry() -> DelegateRegistry<UserRecord> {
    DelegateRegistry::new("UserMenu")
}

async fn register_menu_handlers(registry: &DelegateRegistry<UserRecord>, gate: &SessionGate) {
    registry.register(GatedHandler::new("Badges", 700, gate)).await;
    registry.register(GatedHandler::new("Blog", 650, gate)).await;
    registry.register(GatedHandler::new("Competency", 600, gate)).await;
    registry.register(GatedHandler::new("Grades", 500, gate)).await;
    registry.register(GatedHandler::new("PrivateFiles", 400, gate)).await;
    registry.register(GatedHandler::new("ReportBuilder", 350, gate)).await;
    registry.register(GatedHandler::new("DataPrivacy", 250, gate)).await;
    registry.register(GatedHandler::new("Policy", 100, gate)).await;
}

#[tokio::test]
async fn returns_all_user_menu_handlers_after_login() {
    init_tracing();
    let gate = SessionGate::default();
    let registry = user_menu_registry();
    register_menu_handlers(&registry, &gate).await;

    let bus = EventBus::new();
    registry.attach_events(&bus);

    gate.set_logged_in(true);
    bus.emit(SessionEvent::Login {
        site_id: "25".to_string(),
    });

    let ctx = ContextKey::new("account");
    let rx = registry.handlers_for(john(), &ctx).await;
    registry.wait_for_ready(&ctx).await;
    eventually(&rx, |list| list.len() == 8).await;

    // Ascending priority order.
    assert_eq!(
        names(&rx.borrow()),
        vec![
            "Policy",
            "DataPrivacy",
            "ReportBuilder",
            "PrivateFiles",
            "Grades",
            "Competency",
            "Blog",
            "Badges",
        ]
    );

    registry.shutdown();
}

#[tokio::test]
async fn logout_empties_the_handler_list() {
    init_tracing();
    let gate = SessionGate::default();
    let registry = user_menu_registry();
    register_menu_handlers(&registry, &gate).await;

    let bus = EventBus::new();
    registry.attach_events(&bus);

    gate.set_logged_in(true);
    let ctx = ContextKey::new("account");
    let rx = registry.handlers_for(john(), &ctx).await;
    registry.wait_for_ready(&ctx).await;
    eventually(&rx, |list| list.len() == 8).await;

    gate.set_logged_in(false);
    bus.emit(SessionEvent::Logout {
        site_id: "25".to_string(),
    });
    eventually(&rx, |list| list.is_empty()).await;

    registry.shutdown();
}

#[tokio::test]
async fn disabled_features_from_config_exclude_handlers() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("plugboard.toml");
    fs::write(
        &config_path,
        r#"
[features]
disabled = "UserMenu_Badges,UserMenu_Blog,UserMenu_Competency,UserMenu_Grades,UserMenu_PrivateFiles,UserMenu_ReportBuilder,UserMenu_DataPrivacy,UserMenu_Policy"
        "#,
    )
    .unwrap();
    let config = Config::load_from_path(config_path).unwrap();

    let gate = SessionGate::default();
    gate.set_logged_in(true);
    let registry = user_menu_registry();
    register_menu_handlers(&registry, &gate).await;
    registry.update_features(config.features.entries()).await;

    let ctx = ContextKey::new("account");
    let rx = registry.handlers_for(john(), &ctx).await;
    registry.wait_for_ready(&ctx).await;

    assert!(rx.borrow().is_empty());
}

#[tokio::test]
async fn context_scoped_disable_leaves_other_contexts_intact() {
    let gate = SessionGate::default();
    gate.set_logged_in(true);
    let registry = user_menu_registry();
    registry.register(GatedHandler::new("Badges", 700, &gate)).await;
    registry
        .update_features(["UserMenu_Badges:account".to_string()])
        .await;

    let account = ContextKey::new("account");
    let course = ContextKey::new("course");
    let account_rx = registry.handlers_for(john(), &account).await;
    let course_rx = registry.handlers_for(john(), &course).await;
    registry.wait_for_ready(&account).await;
    registry.wait_for_ready(&course).await;

    assert!(account_rx.borrow().is_empty());
    assert_eq!(names(&course_rx.borrow()), vec!["Badges"]);
}

#[tokio::test]
async fn static_handlers_mix_with_gated_ones() {
    let gate = SessionGate::default();
    gate.set_logged_in(true);
    let registry = user_menu_registry();
    registry.register(GatedHandler::new("Grades", 500, &gate)).await;
    registry
        .register(Arc::new(StaticHandler::new("Settings", 900)))
        .await;

    let ctx = ContextKey::new("account");
    let rx = registry.handlers_for(john(), &ctx).await;
    registry.wait_for_ready(&ctx).await;

    assert_eq!(names(&rx.borrow()), vec!["Grades", "Settings"]);
    assert_eq!(rx.borrow()[1].data.title, "Settings");
}

#[tokio::test]
async fn display_data_reflects_the_subject() {
    let gate = SessionGate::default();
    gate.set_logged_in(true);
    let registry = user_menu_registry();
    registry.register(GatedHandler::new("Grades", 500, &gate)).await;

    let ctx = ContextKey::new("account");
    let rx = registry.handlers_for(john(), &ctx).await;
    registry.wait_for_ready(&ctx).await;

    let list = rx.borrow().clone();
    assert_eq!(list[0].data.title, "Grades (123)");
    assert_eq!(list[0].data.icon.as_deref(), Some("icon-Grades"));
}

#[tokio::test]
async fn two_subscribers_share_one_evaluation() {
    let gate = SessionGate::default();
    gate.set_logged_in(true);
    let registry = user_menu_registry();
    registry.register(GatedHandler::new("Grades", 500, &gate)).await;

    let ctx = ContextKey::new("account");
    let first = registry.handlers_for(john(), &ctx).await;
    let second = registry.handlers_for(john(), &ctx).await;
    registry.wait_for_ready(&ctx).await;

    assert_eq!(names(&first.borrow()), vec!["Grades"]);
    assert_eq!(names(&second.borrow()), vec!["Grades"]);
    // One pass for both subscribers, plus the replayed initial value.
    assert_eq!(registry.metrics().passes_completed, 1);
}
