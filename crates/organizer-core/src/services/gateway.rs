// ============================================================================
// Organizer Core - Mutation Gateway
// File: crates/organizer-core/src/services/gateway.rs
// Description: validate -> authorize -> rate-limit -> execute or enqueue
// ============================================================================
//! Every menu create/update/delete/reorder passes through here.
//!
//! When the network is usable the mutation goes to the store through the
//! retry executor; a transient failure that survives every retry lands in
//! the offline queue instead of surfacing. When the network is down from
//! the start, checks run against the identity's local view and the
//! mutation is queued right away. Each attempt leaves one audit record.

use chrono::Utc;
use organizer_security::{ContentValidator, IssueCode, ValidationIssue, ValidationReport};
use organizer_shared::config::LimitSettings;
use organizer_shared::constants::DEFAULT_MAX_MENUS_PER_OWNER;
use organizer_shared::{new_id, EntityId, Identity};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

use super::access_resolver::AccessResolver;
use super::menu_view::{MenuView, SessionViews};
use super::metrics::GatewayMetrics;
use super::network::NetworkState;
use super::offline_queue::OfflineQueue;
use super::rate_limiter::RateLimiter;
use super::retry::{RetryExecutor, RetryPolicy};
use crate::domain::{
    AccessDecision, AccessSubject, ActionKind, AppliedChange, AuditEntry, DenyReason, Membership,
    Menu, MenuMutation, MenuOrder, MenuPatch, MutationOutcome, NewMenu, OfflineAction, Severity,
};
use crate::error::{MutationError, StorageError, StoreError};
use crate::repositories::{AuditSink, MenuStore};

/// Order value meaning "after the owner's last menu".
const PLACE_LAST: i32 = -1;

#[derive(Debug, Clone, Copy)]
pub struct GatewayLimits {
    pub max_menus_per_owner: usize,
}

impl Default for GatewayLimits {
    fn default() -> Self {
        Self {
            max_menus_per_owner: DEFAULT_MAX_MENUS_PER_OWNER,
        }
    }
}

impl From<&LimitSettings> for GatewayLimits {
    fn from(settings: &LimitSettings) -> Self {
        Self {
            max_menus_per_owner: settings.max_menus_per_owner,
        }
    }
}

/// Process-wide singletons the gateway shares with the rest of the app.
#[derive(Clone)]
pub struct GatewayServices {
    pub network: Arc<NetworkState>,
    pub queue: Arc<OfflineQueue>,
    pub limiter: Arc<RateLimiter>,
    pub views: Arc<SessionViews>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// A new request from a caller.
    Fresh,
    /// A queued action being replayed. No rate limit, no re-enqueue.
    Replay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Online,
    Offline,
}

pub struct MutationGateway<S: MenuStore> {
    store: Arc<S>,
    access: AccessResolver<S>,
    services: GatewayServices,
    validator: ContentValidator,
    retry: RetryExecutor,
    audit: Arc<dyn AuditSink>,
    metrics: Arc<GatewayMetrics>,
    limits: GatewayLimits,
}

impl<S: MenuStore> MutationGateway<S> {
    pub fn new(
        store: Arc<S>,
        services: GatewayServices,
        validator: ContentValidator,
        retry_policy: RetryPolicy,
        audit: Arc<dyn AuditSink>,
        metrics: Arc<GatewayMetrics>,
        limits: GatewayLimits,
    ) -> Self {
        let retry = RetryExecutor::new(retry_policy, services.network.clone()).with_metrics(metrics.clone());
        Self {
            access: AccessResolver::new(store.clone()),
            store,
            services,
            validator,
            retry,
            audit,
            metrics,
            limits,
        }
    }

    pub fn network(&self) -> &Arc<NetworkState> {
        &self.services.network
    }

    pub fn queue(&self) -> &Arc<OfflineQueue> {
        &self.services.queue
    }

    pub fn views(&self) -> &Arc<SessionViews> {
        &self.services.views
    }

    pub fn metrics(&self) -> &Arc<GatewayMetrics> {
        &self.metrics
    }

    // ------------------------------------------------------------------
    // Operations
    // ------------------------------------------------------------------

    pub async fn create_menu(
        &self,
        identity: &Identity,
        input: NewMenu,
    ) -> Result<MutationOutcome<AppliedChange>, MutationError> {
        if let Err(e) = input.validate() {
            let err = MutationError::Validation { issues: field_issues(&e) };
            self.record_failure(identity, ActionKind::Create, Mode::Fresh, None, &err);
            return Err(err);
        }

        let now = Utc::now();
        let menu = Menu {
            id: new_id(),
            owner_id: *identity,
            name: input.name,
            menu_type: input.menu_type,
            config: input.config,
            order: input.order.unwrap_or(PLACE_LAST),
            is_private: input.is_private,
            created_at: now,
            updated_at: now,
        };
        self.submit(identity, MenuMutation::Create(menu), Mode::Fresh).await
    }

    pub async fn update_menu(
        &self,
        identity: &Identity,
        menu_id: EntityId,
        patch: MenuPatch,
    ) -> Result<MutationOutcome<AppliedChange>, MutationError> {
        self.submit(identity, MenuMutation::Update { menu_id, patch }, Mode::Fresh).await
    }

    pub async fn delete_menu(
        &self,
        identity: &Identity,
        menu_id: EntityId,
    ) -> Result<MutationOutcome<AppliedChange>, MutationError> {
        self.submit(identity, MenuMutation::Delete { menu_id }, Mode::Fresh).await
    }

    pub async fn reorder_menus(
        &self,
        identity: &Identity,
        orders: Vec<MenuOrder>,
    ) -> Result<MutationOutcome<AppliedChange>, MutationError> {
        self.submit(identity, MenuMutation::Reorder { orders }, Mode::Fresh).await
    }

    /// Replay a queued action against the store. Re-runs validation and
    /// authorization; skips the rate limiter; never re-enqueues.
    pub async fn replay(&self, action: &OfflineAction) -> Result<(), MutationError> {
        let mutation = action
            .mutation()
            .map_err(|e| MutationError::Queue(StorageError::Corrupt(e.to_string())))?;
        let kind = mutation.kind();
        let target = mutation.target();

        match self.submit(&action.identity, mutation, Mode::Replay).await {
            Ok(_) => Ok(()),
            // Already gone: the delete is done.
            Err(MutationError::Unauthorized { reason: DenyReason::NotFound }) if kind == ActionKind::Delete => {
                debug!(action_id = %action.id, "Replayed delete of a missing menu");
                Ok(())
            }
            // An earlier attempt may have landed before the connection dropped.
            Err(MutationError::Store(StoreError::Conflict(message))) if kind == ActionKind::Create => {
                let Some(id) = target else {
                    return Err(MutationError::Store(StoreError::Conflict(message)));
                };
                match self.store.find_menu(&id).await {
                    Ok(Some(existing)) if existing.owner_id == action.identity => {
                        self.services.views.view_for(&action.identity).apply_change(&AppliedChange::Created(existing));
                        Ok(())
                    }
                    _ => Err(MutationError::Store(StoreError::Conflict(message))),
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Menus visible to `identity`. Reads the store when usable and falls
    /// back to the local view otherwise.
    pub async fn list_menus(&self, identity: &Identity) -> Result<Vec<Menu>, MutationError> {
        let view = self.services.views.view_for(identity);

        if self.services.network.is_usable() {
            match self.fetch_accessible(identity).await {
                Ok((menus, memberships)) => {
                    view.replace_all(menus, memberships);
                    // Keep queued changes visible until they are replayed.
                    for action in self.services.queue.list(identity).await {
                        if let Ok(mutation) = action.mutation() {
                            view.apply_pending(&mutation);
                        }
                    }
                }
                Err(e) if e.is_retryable() => {
                    warn!(identity = %identity, "Store unreachable, serving cached menus: {}", e);
                }
                Err(e) => return Err(MutationError::Store(e)),
            }
        }

        Ok(view.visible())
    }

    pub async fn has_pending_actions(&self, identity: &Identity) -> bool {
        self.services.queue.has(identity).await
    }

    pub async fn pending_actions(&self, identity: &Identity) -> Vec<OfflineAction> {
        self.services.queue.list(identity).await
    }

    /// Capabilities of `identity` on a menu, straight from the store.
    pub async fn resolve_access(&self, menu_id: &EntityId, identity: &Identity) -> Result<AccessDecision, StoreError> {
        self.retry.run("resolve_access", || self.access.resolve(menu_id, identity)).await
    }

    // ------------------------------------------------------------------
    // Pipeline
    // ------------------------------------------------------------------

    async fn submit(
        &self,
        identity: &Identity,
        mutation: MenuMutation,
        mode: Mode,
    ) -> Result<MutationOutcome<AppliedChange>, MutationError> {
        let kind = mutation.kind();
        let target = mutation.target();
        let view = self.services.views.view_for(identity);
        let mut route = if mode == Mode::Replay || self.services.network.is_usable() {
            Route::Online
        } else {
            Route::Offline
        };

        let mutation = match self.prepare(identity, mutation, &view, &mut route, mode).await {
            Ok(prepared) => prepared,
            Err(e) => {
                self.record_failure(identity, kind, mode, target, &e);
                return Err(e);
            }
        };

        if mode == Mode::Fresh {
            let status = self.services.limiter.check(identity);
            if !status.allowed {
                let err = MutationError::RateLimited { reset_at: status.reset_at };
                self.record_failure(identity, kind, mode, target, &err);
                return Err(err);
            }
        }

        if route == Route::Online {
            match self.execute(&mutation).await {
                Ok(change) => {
                    view.apply_change(&change);
                    info!(identity = %identity, action = %kind, menu_id = ?target, "Mutation applied");
                    self.record(identity, kind, mode, "applied", Severity::Low, json!({ "menuId": target }));
                    return Ok(MutationOutcome::Applied(change));
                }
                Err(e) if e.is_retryable() && mode == Mode::Fresh => {
                    warn!(identity = %identity, action = %kind, "Store unreachable after retries, queueing: {}", e);
                }
                Err(e) => {
                    let err = MutationError::Store(e);
                    self.record_failure(identity, kind, mode, target, &err);
                    return Err(err);
                }
            }
        }

        match self.enqueue(identity, &mutation).await {
            Ok(action_id) => {
                view.apply_pending(&mutation);
                info!(identity = %identity, action = %kind, %action_id, "Mutation queued for replay");
                self.record(
                    identity,
                    kind,
                    mode,
                    "queued",
                    Severity::Low,
                    json!({ "menuId": target, "actionId": action_id }),
                );
                Ok(MutationOutcome::Queued(action_id))
            }
            Err(e) => {
                self.record_failure(identity, kind, mode, target, &e);
                Err(e)
            }
        }
    }

    async fn prepare(
        &self,
        identity: &Identity,
        mutation: MenuMutation,
        view: &MenuView,
        route: &mut Route,
        mode: Mode,
    ) -> Result<MenuMutation, MutationError> {
        match mutation {
            MenuMutation::Create(menu) => self
                .prepare_create(identity, menu, view, route, mode)
                .await
                .map(MenuMutation::Create),
            MenuMutation::Update { menu_id, patch } => {
                let patch = self.prepare_update(identity, menu_id, patch, view, route, mode).await?;
                Ok(MenuMutation::Update { menu_id, patch })
            }
            MenuMutation::Delete { menu_id } => {
                let menu = self.load_menu(menu_id, view, route, mode).await?;
                let decision = self.authorize(identity, &menu, view, route, mode).await?;
                if !decision.can_delete {
                    return Err(MutationError::Unauthorized { reason: decision.denial() });
                }
                Ok(MenuMutation::Delete { menu_id })
            }
            MenuMutation::Reorder { orders } => {
                self.prepare_reorder(identity, &orders, view, route, mode).await?;
                Ok(MenuMutation::Reorder { orders })
            }
        }
    }

    async fn prepare_create(
        &self,
        identity: &Identity,
        mut menu: Menu,
        view: &MenuView,
        route: &mut Route,
        mode: Mode,
    ) -> Result<Menu, MutationError> {
        let owned = self.owned_menus(identity, view, route, mode).await?;
        let others: Vec<&Menu> = owned.iter().filter(|m| m.id != menu.id).collect();
        let existing: Vec<String> = others.iter().map(|m| m.name.clone()).collect();

        let report = self.validator.validate(&menu.name, menu.menu_type, &menu.config, &existing);
        check_report(&report)?;

        // Creation has no resource to authorize against; only the ceiling applies.
        if others.len() >= self.limits.max_menus_per_owner {
            return Err(MutationError::LimitReached {
                limit: self.limits.max_menus_per_owner,
            });
        }

        if menu.order < 0 {
            menu.order = others.iter().map(|m| m.order + 1).max().unwrap_or(0);
        }
        menu.name = report.sanitized.name;
        menu.config = report.sanitized.config;
        Ok(menu)
    }

    async fn prepare_update(
        &self,
        identity: &Identity,
        menu_id: EntityId,
        mut patch: MenuPatch,
        view: &MenuView,
        route: &mut Route,
        mode: Mode,
    ) -> Result<MenuPatch, MutationError> {
        if patch.is_empty() {
            return Err(MutationError::Validation {
                issues: vec![ValidationIssue::new("patch", IssueCode::Required, "Nothing to update")],
            });
        }
        if let Err(e) = patch.validate() {
            return Err(MutationError::Validation { issues: field_issues(&e) });
        }

        let menu = self.load_menu(menu_id, view, route, mode).await?;

        if patch.touches_content() {
            let owned = self.owned_menus(&menu.owner_id, view, route, mode).await?;
            let existing: Vec<String> = owned
                .iter()
                .filter(|m| m.id != menu.id)
                .map(|m| m.name.clone())
                .collect();
            let name = patch.name.as_deref().unwrap_or(&menu.name);
            let config = patch.config.as_ref().unwrap_or(&menu.config);

            let report = self.validator.validate(name, menu.menu_type, config, &existing);
            check_report(&report)?;
            if patch.name.is_some() {
                patch.name = Some(report.sanitized.name);
            }
            if patch.config.is_some() {
                patch.config = Some(report.sanitized.config);
            }
        }

        let decision = self.authorize(identity, &menu, view, route, mode).await?;
        if !decision.can_edit {
            return Err(MutationError::Unauthorized { reason: decision.denial() });
        }
        Ok(patch)
    }

    async fn prepare_reorder(
        &self,
        identity: &Identity,
        orders: &[MenuOrder],
        view: &MenuView,
        route: &mut Route,
        mode: Mode,
    ) -> Result<(), MutationError> {
        let mut issues = Vec::new();
        if orders.is_empty() {
            issues.push(ValidationIssue::new("orders", IssueCode::Required, "Nothing to reorder"));
        }
        let mut seen = HashSet::new();
        for entry in orders {
            if !seen.insert(entry.menu_id) {
                issues.push(ValidationIssue::new(
                    "orders",
                    IssueCode::Duplicate,
                    format!("Menu {} listed twice", entry.menu_id),
                ));
            }
            if let Err(e) = entry.validate() {
                issues.extend(field_issues(&e));
            }
        }
        if !issues.is_empty() {
            return Err(MutationError::Validation { issues });
        }

        let ids: Vec<EntityId> = orders.iter().map(|o| o.menu_id).collect();
        let store = &self.store;
        let menus = match self
            .read(route, mode, "list_menus_by_ids", || store.list_menus_by_ids(&ids))
            .await?
        {
            Some(menus) => menus,
            None => ids.iter().filter_map(|id| view.find(id)).collect(),
        };

        for id in &ids {
            let menu = menus
                .iter()
                .find(|m| m.id == *id)
                .ok_or(MutationError::Unauthorized { reason: DenyReason::NotFound })?;
            let decision = self.authorize(identity, menu, view, route, mode).await?;
            if !decision.can_edit {
                return Err(MutationError::Unauthorized { reason: decision.denial() });
            }
        }
        Ok(())
    }

    async fn execute(&self, mutation: &MenuMutation) -> Result<AppliedChange, StoreError> {
        let store = &self.store;
        match mutation {
            MenuMutation::Create(menu) => self
                .retry
                .run("insert_menu", || store.insert_menu(menu))
                .await
                .map(AppliedChange::Created),
            MenuMutation::Update { menu_id, patch } => self
                .retry
                .run("update_menu", || store.update_menu(menu_id, patch))
                .await
                .map(AppliedChange::Updated),
            MenuMutation::Delete { menu_id } => {
                match self.retry.run("delete_menu", || store.delete_menu(menu_id)).await {
                    Ok(()) | Err(StoreError::NotFound) => Ok(AppliedChange::Deleted(*menu_id)),
                    Err(e) => Err(e),
                }
            }
            MenuMutation::Reorder { orders } => self
                .retry
                .run("reorder_menus", move || async move {
                    let mut updated = Vec::with_capacity(orders.len());
                    for entry in orders {
                        let patch = MenuPatch::order_only(entry.order);
                        updated.push(store.update_menu(&entry.menu_id, &patch).await?);
                    }
                    Ok::<_, StoreError>(updated)
                })
                .await
                .map(AppliedChange::Reordered),
        }
    }

    async fn enqueue(&self, identity: &Identity, mutation: &MenuMutation) -> Result<EntityId, MutationError> {
        let action = OfflineAction::new(*identity, mutation).map_err(StorageError::from)?;
        let action_id = action.id;
        self.services.queue.enqueue(action).await?;
        Ok(action_id)
    }

    // ------------------------------------------------------------------
    // Lookups (store when online, local view otherwise)
    // ------------------------------------------------------------------

    /// Run a store read. `None` means the read was skipped or the store is
    /// unreachable and the caller should use the local view. In replay mode
    /// an unreachable store is an error instead.
    async fn read<T, F, Fut>(
        &self,
        route: &mut Route,
        mode: Mode,
        label: &str,
        operation: F,
    ) -> Result<Option<T>, MutationError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        if *route == Route::Offline {
            return Ok(None);
        }
        match self.retry.run(label, operation).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_retryable() && mode == Mode::Fresh => {
                warn!(operation = label, "Store unreachable during checks, continuing offline: {}", e);
                *route = Route::Offline;
                Ok(None)
            }
            Err(e) => Err(MutationError::Store(e)),
        }
    }

    async fn load_menu(
        &self,
        menu_id: EntityId,
        view: &MenuView,
        route: &mut Route,
        mode: Mode,
    ) -> Result<Menu, MutationError> {
        let store = &self.store;
        let found = match self.read(route, mode, "find_menu", || store.find_menu(&menu_id)).await? {
            Some(found) => found,
            None => view.find(&menu_id),
        };
        found.ok_or(MutationError::Unauthorized { reason: DenyReason::NotFound })
    }

    async fn owned_menus(
        &self,
        owner: &Identity,
        view: &MenuView,
        route: &mut Route,
        mode: Mode,
    ) -> Result<Vec<Menu>, MutationError> {
        let store = &self.store;
        Ok(match self.read(route, mode, "list_owned", || store.list_owned(owner)).await? {
            Some(menus) => menus,
            None => view.owned_by(owner),
        })
    }

    async fn authorize(
        &self,
        identity: &Identity,
        menu: &Menu,
        view: &MenuView,
        route: &mut Route,
        mode: Mode,
    ) -> Result<AccessDecision, MutationError> {
        let access = &self.access;
        let resolved = self
            .read(route, mode, "resolve_access", || access.resolve_menu(Some(menu), identity))
            .await?;
        Ok(match resolved {
            Some(decision) => decision,
            None => AccessSubject::classify(Some(menu), view.membership(&menu.id).as_ref(), identity).decision(),
        })
    }

    async fn fetch_accessible(&self, identity: &Identity) -> Result<(Vec<Menu>, Vec<Membership>), StoreError> {
        let store = &self.store;
        let mut menus = self.retry.run("list_owned", || store.list_owned(identity)).await?;
        let memberships = self
            .retry
            .run("list_memberships", || store.list_memberships(identity))
            .await?;

        let shared_ids: Vec<EntityId> = memberships
            .iter()
            .map(|m| m.menu_id)
            .filter(|id| !menus.iter().any(|owned| owned.id == *id))
            .collect();
        if !shared_ids.is_empty() {
            let shared = self
                .retry
                .run("list_menus_by_ids", || store.list_menus_by_ids(&shared_ids))
                .await?;
            menus.extend(shared);
        }

        let public = self
            .retry
            .run("list_public_groups", || store.list_public_groups())
            .await?;
        for menu in public {
            if !menus.iter().any(|known| known.id == menu.id) {
                menus.push(menu);
            }
        }
        Ok((menus, memberships))
    }

    // ------------------------------------------------------------------
    // Audit
    // ------------------------------------------------------------------

    fn record(&self, identity: &Identity, kind: ActionKind, mode: Mode, outcome: &str, severity: Severity, details: Value) {
        let action = match mode {
            Mode::Fresh => format!("menu.{}", kind),
            Mode::Replay => format!("menu.{}.replay", kind),
        };
        let mut details = details;
        if let Value::Object(map) = &mut details {
            map.insert("outcome".to_string(), Value::String(outcome.to_string()));
        }
        self.audit.record(AuditEntry::new(*identity, action, details, severity));
        if mode == Mode::Fresh {
            self.metrics.record_mutation(kind, outcome);
        }
    }

    fn record_failure(
        &self,
        identity: &Identity,
        kind: ActionKind,
        mode: Mode,
        target: Option<EntityId>,
        error: &MutationError,
    ) {
        let severity = match error {
            MutationError::Validation { issues } if issues.iter().any(|i| i.code == IssueCode::MaliciousPattern) => {
                Severity::High
            }
            MutationError::Validation { .. } | MutationError::LimitReached { .. } => Severity::Low,
            MutationError::Unauthorized { .. } | MutationError::RateLimited { .. } => Severity::Medium,
            MutationError::Store(_) => Severity::High,
            MutationError::Queue(_) => Severity::Critical,
        };
        if severity >= Severity::Medium {
            warn!(identity = %identity, action = %kind, menu_id = ?target, "Mutation blocked: {}", error);
        } else {
            debug!(identity = %identity, action = %kind, menu_id = ?target, "Mutation rejected: {}", error);
        }
        self.record(
            identity,
            kind,
            mode,
            error.outcome(),
            severity,
            json!({ "menuId": target, "error": error.to_string() }),
        );
    }
}

fn check_report(report: &ValidationReport) -> Result<(), MutationError> {
    if !report.warnings.is_empty() {
        debug!(warnings = report.warnings.len(), "Content accepted with warnings");
    }
    if report.ok {
        Ok(())
    } else {
        Err(MutationError::Validation {
            issues: report.errors.clone(),
        })
    }
}

fn field_issues(errors: &validator::ValidationErrors) -> Vec<ValidationIssue> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, errs)| {
            errs.iter().map(move |e| {
                let message = e
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("{} is out of range", field));
                ValidationIssue::new(field.to_string(), IssueCode::OutOfRange, message)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MemberRole;
    use crate::repositories::{MemoryAuditSink, MemoryLocalStore, MockMenuStore, SnapshotJournal};
    use crate::services::rate_limiter::RateLimitConfig;
    use organizer_shared::MenuType;
    use std::time::Duration;

    struct Harness {
        gateway: MutationGateway<MockMenuStore>,
        audit: Arc<MemoryAuditSink>,
        queue: Arc<OfflineQueue>,
    }

    fn harness(store: MockMenuStore, network: NetworkState, max_actions: u32) -> Harness {
        let audit = Arc::new(MemoryAuditSink::new());
        let queue = Arc::new(OfflineQueue::new(Arc::new(SnapshotJournal::new(Arc::new(MemoryLocalStore::new())))));
        let services = GatewayServices {
            network: Arc::new(network),
            queue: queue.clone(),
            limiter: Arc::new(RateLimiter::new(RateLimitConfig {
                window: chrono::Duration::seconds(60),
                max_actions,
            })),
            views: Arc::new(SessionViews::new()),
        };
        let policy = RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            factor: 2,
        };
        let gateway = MutationGateway::new(
            Arc::new(store),
            services,
            ContentValidator::default(),
            policy,
            audit.clone(),
            Arc::new(GatewayMetrics::new().unwrap()),
            GatewayLimits { max_menus_per_owner: 3 },
        );
        Harness { gateway, audit, queue }
    }

    fn menu(owner: Identity, name: &str, menu_type: MenuType) -> Menu {
        let now = Utc::now();
        Menu {
            id: new_id(),
            owner_id: owner,
            name: name.into(),
            menu_type,
            config: json!({}),
            order: 0,
            is_private: false,
            created_at: now,
            updated_at: now,
        }
    }

    fn rename(name: &str) -> MenuPatch {
        MenuPatch { name: Some(name.into()), ..MenuPatch::default() }
    }

    fn new_menu(name: &str) -> NewMenu {
        NewMenu {
            name: name.into(),
            menu_type: MenuType::Dashboard,
            config: json!({}),
            is_private: false,
            order: None,
        }
    }

    fn store_with(menu: Menu) -> MockMenuStore {
        let mut store = MockMenuStore::new();
        let found = menu.clone();
        store.expect_find_menu().returning(move |_| Ok(Some(found.clone())));
        let owned = vec![menu];
        store.expect_list_owned().returning(move |_| Ok(owned.clone()));
        store
    }

    #[tokio::test]
    async fn test_online_update_is_applied() {
        let owner = new_id();
        let m = menu(owner, "Debts", MenuType::Dashboard);
        let mut store = store_with(m.clone());
        let mut updated = m.clone();
        updated.name = "A".into();
        store.expect_update_menu().times(1).returning(move |_, _| Ok(updated.clone()));

        let h = harness(store, NetworkState::new(), 30);
        let outcome = h.gateway.update_menu(&owner, m.id, rename("A")).await.unwrap();

        assert!(matches!(outcome, MutationOutcome::Applied(AppliedChange::Updated(ref x)) if x.name == "A"));
        assert_eq!(h.gateway.views().view_for(&owner).find(&m.id).unwrap().name, "A");
        let audit = h.audit.entries();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].action, "menu.update");
        assert_eq!(audit[0].details["outcome"], json!("applied"));
    }

    #[tokio::test]
    async fn test_offline_update_is_queued_against_the_view() {
        let owner = new_id();
        let m = menu(owner, "Debts", MenuType::Dashboard);
        let mut store = MockMenuStore::new();
        store.expect_find_menu().never();
        store.expect_update_menu().never();

        let h = harness(store, NetworkState::offline(), 30);
        h.gateway.views().view_for(&owner).replace_all(vec![m.clone()], vec![]);

        let outcome = h.gateway.update_menu(&owner, m.id, rename("A")).await.unwrap();
        assert!(outcome.is_queued());
        assert_eq!(h.queue.len(&owner).await, 1);
        assert!(h.gateway.has_pending_actions(&owner).await);
        assert_eq!(h.gateway.views().view_for(&owner).find(&m.id).unwrap().name, "A");
        assert_eq!(h.audit.entries()[0].details["outcome"], json!("queued"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_fall_back_to_queue() {
        let owner = new_id();
        let m = menu(owner, "Debts", MenuType::Dashboard);
        let mut store = store_with(m.clone());
        store
            .expect_update_menu()
            .times(3)
            .returning(|_, _| Err(StoreError::Status { status: 503, message: "unavailable".into() }));

        let h = harness(store, NetworkState::new(), 30);
        let outcome = h.gateway.update_menu(&owner, m.id, rename("A")).await.unwrap();

        assert!(outcome.is_queued());
        assert_eq!(h.queue.len(&owner).await, 1);
        assert!(!h.gateway.network().snapshot().is_connected);
    }

    #[tokio::test]
    async fn test_fatal_store_error_is_surfaced_not_queued() {
        let owner = new_id();
        let m = menu(owner, "Debts", MenuType::Dashboard);
        let mut store = store_with(m.clone());
        store
            .expect_update_menu()
            .times(1)
            .returning(|_, _| Err(StoreError::Status { status: 400, message: "bad column".into() }));

        let h = harness(store, NetworkState::new(), 30);
        let err = h.gateway.update_menu(&owner, m.id, rename("A")).await.unwrap_err();

        assert!(matches!(err, MutationError::Store(_)));
        assert!(!h.queue.has(&owner).await);
        assert_eq!(h.audit.entries()[0].severity, Severity::High);
    }

    #[tokio::test]
    async fn test_member_cannot_delete_group() {
        let owner = new_id();
        let member = new_id();
        let group = menu(owner, "Raid team", MenuType::Group);
        let row = Membership { menu_id: group.id, member_id: member, role: MemberRole::Member, joined_at: Utc::now() };

        let mut store = store_with(group.clone());
        store.expect_find_membership().returning(move |_, _| Ok(Some(row.clone())));
        store.expect_delete_menu().never();

        let h = harness(store, NetworkState::new(), 30);
        let err = h.gateway.delete_menu(&member, group.id).await.unwrap_err();

        assert!(matches!(err, MutationError::Unauthorized { reason: DenyReason::InsufficientRole }));
        let audit = h.audit.entries();
        assert_eq!(audit[0].severity, Severity::Medium);
        assert_eq!(audit[0].details["outcome"], json!("denied"));
    }

    #[tokio::test]
    async fn test_malicious_create_is_rejected_before_the_store() {
        let owner = new_id();
        let mut store = MockMenuStore::new();
        store.expect_list_owned().returning(|_| Ok(vec![]));
        store.expect_insert_menu().never();

        let h = harness(store, NetworkState::new(), 30);
        let mut input = new_menu("Board");
        input.config = json!({ "query": "1; DROP TABLE menus" });
        let err = h.gateway.create_menu(&owner, input).await.unwrap_err();

        assert!(matches!(err, MutationError::Validation { .. }));
        assert_eq!(h.audit.entries()[0].severity, Severity::High);
    }

    #[tokio::test]
    async fn test_create_places_menu_last_and_sanitizes() {
        let owner = new_id();
        let mut existing = menu(owner, "Debts", MenuType::Dashboard);
        existing.order = 4;
        let mut store = MockMenuStore::new();
        store.expect_list_owned().returning(move |_| Ok(vec![existing.clone()]));
        store.expect_insert_menu().times(1).returning(|m| Ok(m.clone()));

        let h = harness(store, NetworkState::new(), 30);
        let mut input = new_menu("  Raids ");
        input.config = json!({ "title": "<script>x()</script>Raids" });
        let outcome = h.gateway.create_menu(&owner, input).await.unwrap();

        let Some(AppliedChange::Created(created)) = outcome.applied() else {
            panic!("expected a created menu");
        };
        assert_eq!(created.name, "Raids");
        assert_eq!(created.order, 5);
        assert_eq!(created.config, json!({ "title": "Raids" }));
    }

    #[tokio::test]
    async fn test_menu_ceiling() {
        let owner = new_id();
        let owned: Vec<Menu> = (0..3).map(|i| menu(owner, &format!("Menu {}", i), MenuType::Project)).collect();
        let mut store = MockMenuStore::new();
        store.expect_list_owned().returning(move |_| Ok(owned.clone()));
        store.expect_insert_menu().never();

        let h = harness(store, NetworkState::new(), 30);
        let err = h.gateway.create_menu(&owner, new_menu("One more")).await.unwrap_err();
        assert!(matches!(err, MutationError::LimitReached { limit: 3 }));
    }

    #[tokio::test]
    async fn test_rate_limit_blocks_after_budget() {
        let owner = new_id();
        let m = menu(owner, "Debts", MenuType::Dashboard);
        let mut store = store_with(m.clone());
        let echo = m.clone();
        store.expect_update_menu().times(2).returning(move |_, _| Ok(echo.clone()));

        let h = harness(store, NetworkState::new(), 2);
        h.gateway.update_menu(&owner, m.id, MenuPatch::order_only(1)).await.unwrap();
        h.gateway.update_menu(&owner, m.id, MenuPatch::order_only(2)).await.unwrap();
        let err = h.gateway.update_menu(&owner, m.id, MenuPatch::order_only(3)).await.unwrap_err();

        assert!(matches!(err, MutationError::RateLimited { .. }));
        assert_eq!(h.audit.entries().len(), 3);
    }

    #[tokio::test]
    async fn test_replay_skips_rate_limit() {
        let owner = new_id();
        let m = menu(owner, "Debts", MenuType::Dashboard);
        let mut store = store_with(m.clone());
        let echo = m.clone();
        store.expect_update_menu().returning(move |_, _| Ok(echo.clone()));

        let h = harness(store, NetworkState::new(), 1);
        h.gateway.update_menu(&owner, m.id, MenuPatch::order_only(1)).await.unwrap();

        let action = OfflineAction::new(owner, &MenuMutation::Update { menu_id: m.id, patch: rename("A") }).unwrap();
        h.gateway.replay(&action).await.unwrap();
        assert_eq!(h.audit.entries()[1].action, "menu.update.replay");
    }

    #[tokio::test]
    async fn test_replayed_delete_of_missing_menu_succeeds() {
        let mut store = MockMenuStore::new();
        store.expect_find_menu().returning(|_| Ok(None));
        store.expect_delete_menu().never();

        let h = harness(store, NetworkState::new(), 30);
        let action = OfflineAction::new(new_id(), &MenuMutation::Delete { menu_id: new_id() }).unwrap();
        assert!(h.gateway.replay(&action).await.is_ok());
    }

    #[tokio::test]
    async fn test_reorder_rejects_duplicates() {
        let h = harness(MockMenuStore::new(), NetworkState::new(), 30);
        let id = new_id();
        let err = h
            .gateway
            .reorder_menus(&new_id(), vec![MenuOrder { menu_id: id, order: 0 }, MenuOrder { menu_id: id, order: 1 }])
            .await
            .unwrap_err();
        let MutationError::Validation { issues } = err else {
            panic!("expected validation error");
        };
        assert_eq!(issues[0].code, IssueCode::Duplicate);
    }
}
