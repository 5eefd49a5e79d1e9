#![forbid(unsafe_code)]

//! Components: stateful elements with their own template.
//!
//! A component is built from a [`ComponentDefinition`] (template, action
//! table, declared children, behavior factory) and lives behind a
//! [`ComponentRef`] handle. Pages are components without bindings; nested
//! components get a binding map from the parent template and a parent
//! pointer when their fault is resolved.
//!
//! # Lifecycle
//!
//! ```text
//! instantiate ──▶ ensure_awake_in_context(ctx) ──▶ phases ──▶ sleep_with_context(ctx)
//!                        ▲                                              │
//!                        └────────── restored from a page cache ◀───────┘
//! ```
//!
//! # Invariants
//!
//! 1. A component is bound to at most one context at a time. Sleeping with
//!    a different context than the bound one is refused and logged.
//! 2. Waking registers the component in the context's awake set, so the
//!    context can sleep it at the end of the transaction.
//! 3. Stateless components lose their extra attributes on sleep and after
//!    every `append_to_response` / `walk_template` pass.
//! 4. The component's lock is never held while running elements, actions
//!    or associations; it only guards field access.
//!
//! # Failure Modes
//!
//! | Operation | Failure | Result |
//! |-----------|---------|--------|
//! | `sleep_with_context` | foreign context | logged, no-op |
//! | `child_component_with_name` | fault cannot be resolved | logged, `None`, fault kept |
//! | `perform_action_named` | unknown action | `ComponentError::MissingAction` |
//! | binding sync | target rejects the value | logged, other bindings continue |

mod fault;

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use ahash::AHashMap;
use woframe_core::{
    AssociationRef, Attributes, KeyValueCoding, KvcError, Record, Request, Response, Value,
};

pub use fault::{ComponentFault, UNRESOLVED_FAULT_MARKER};

use crate::context::Context;
use crate::element::{ActionResult, Element, ElementRef, ElementWalker};
use crate::error::{ComponentError, Result};
use crate::resource_manager::ResourceManager;
use crate::session::{SessionCell, SessionRef};

/// Binding name → association, as declared by a parent template.
pub type Bindings = BTreeMap<String, AssociationRef>;

/// A named component action.
pub type Action = Arc<dyn Fn(&ComponentRef, &mut Context) -> Result<ActionResult> + Send + Sync>;

/// Builds the behavior for a fresh instance.
pub type BehaviorFactory = Arc<dyn Fn() -> Box<dyn ComponentBehavior> + Send + Sync>;

// ---------------------------------------------------------------------------
// Behavior
// ---------------------------------------------------------------------------

/// Object-safe access to the concrete behavior type.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// User-supplied per-instance state and hooks.
///
/// Keys the behavior does not claim fall through to the component's extra
/// attributes, so a behavior with no fields at all (see
/// [`DynamicBehavior`]) gives a fully dynamic component.
pub trait ComponentBehavior: AsAny + Send {
    fn value_for_key(&self, _key: &str) -> Option<Value> {
        None
    }

    /// Store `value` for `key`, or hand it back when the key is not ours.
    fn take_value_for_key(&mut self, value: Value, _key: &str) -> std::result::Result<(), Value> {
        Err(value)
    }

    fn awake(&mut self) {}

    fn sleep(&mut self) {}

    fn is_stateless(&self) -> bool {
        false
    }

    /// `false` opts out of automatic binding pull/push.
    fn synchronizes_variables_with_bindings(&self) -> bool {
        true
    }
}

/// Behavior with no fields: every key lives in the extra attributes.
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamicBehavior;

impl ComponentBehavior for DynamicBehavior {}

/// A dynamic behavior that reports itself stateless.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatelessBehavior;

impl ComponentBehavior for StatelessBehavior {
    fn is_stateless(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Definition
// ---------------------------------------------------------------------------

/// A child slot declared by a component template.
#[derive(Debug, Clone)]
pub struct ChildDeclaration {
    pub key: String,
    pub component_name: String,
    pub bindings: Bindings,
}

/// Blueprint for instantiating a component.
pub struct ComponentDefinition {
    name: String,
    template: ElementRef,
    actions: AHashMap<String, Action>,
    children: Vec<ChildDeclaration>,
    behavior: BehaviorFactory,
}

impl fmt::Debug for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentDefinition")
            .field("name", &self.name)
            .field("actions", &self.action_names())
            .field("children", &self.children)
            .finish_non_exhaustive()
    }
}

impl ComponentDefinition {
    pub fn new(name: impl Into<String>, template: ElementRef) -> Self {
        Self {
            name: name.into(),
            template,
            actions: AHashMap::new(),
            children: Vec::new(),
            behavior: Arc::new(|| Box::new(DynamicBehavior)),
        }
    }

    #[must_use]
    pub fn with_action<F>(mut self, name: &str, action: F) -> Self
    where
        F: Fn(&ComponentRef, &mut Context) -> Result<ActionResult> + Send + Sync + 'static,
    {
        self.actions.insert(name.to_owned(), Arc::new(action));
        self
    }

    #[must_use]
    pub fn with_child(mut self, key: &str, component_name: &str, bindings: Bindings) -> Self {
        self.children.push(ChildDeclaration {
            key: key.to_owned(),
            component_name: component_name.to_owned(),
            bindings,
        });
        self
    }

    #[must_use]
    pub fn with_behavior<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn ComponentBehavior> + Send + Sync + 'static,
    {
        self.behavior = Arc::new(factory);
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn template(&self) -> &ElementRef {
        &self.template
    }

    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }

    pub fn action_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.actions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn children(&self) -> &[ChildDeclaration] {
        &self.children
    }

    /// Build a fresh instance whose children are all faults.
    pub fn instantiate(
        self: &Arc<Self>,
        resource_manager: Option<Arc<dyn ResourceManager>>,
    ) -> ComponentRef {
        let children = self
            .children
            .iter()
            .map(|decl| {
                let fault = ComponentFault::new(
                    decl.key.clone(),
                    decl.component_name.clone(),
                    decl.bindings.clone(),
                    resource_manager.clone(),
                );
                (decl.key.clone(), Child::Fault(fault))
            })
            .collect();

        ComponentRef::new(Component {
            name: self.name.clone(),
            definition: Arc::clone(self),
            behavior: (self.behavior)(),
            extra: Attributes::new(),
            bindings: None,
            parent: None,
            children,
            context_id: None,
            session: None,
            awake: false,
            resource_manager,
        })
    }
}

// ---------------------------------------------------------------------------
// Component state
// ---------------------------------------------------------------------------

/// A child slot: unresolved fault or live component.
#[derive(Debug, Clone)]
pub enum Child {
    Fault(ComponentFault),
    Resolved(ComponentRef),
}

/// Component state. Always accessed through a [`ComponentRef`].
pub struct Component {
    name: String,
    definition: Arc<ComponentDefinition>,
    behavior: Box<dyn ComponentBehavior>,
    extra: Attributes,
    bindings: Option<Bindings>,
    parent: Option<Weak<ComponentCell>>,
    children: BTreeMap<String, Child>,
    context_id: Option<String>,
    session: Option<Weak<SessionCell>>,
    awake: bool,
    resource_manager: Option<Arc<dyn ResourceManager>>,
}

impl Component {
    fn resolved_children(&self) -> Vec<ComponentRef> {
        self.children
            .values()
            .filter_map(|child| match child {
                Child::Resolved(c) => Some(c.clone()),
                Child::Fault(_) => None,
            })
            .collect()
    }

    fn builtin_value(&self, key: &str) -> Option<Value> {
        match key {
            "name" => Some(Value::from(self.name.clone())),
            "parent" => Some(
                self.parent
                    .as_ref()
                    .and_then(Weak::upgrade)
                    .map_or(Value::Null, |p| Value::Object(p)),
            ),
            "session" => Some(
                self.session
                    .as_ref()
                    .and_then(Weak::upgrade)
                    .map_or(Value::Null, |s| Value::Object(s)),
            ),
            _ => None,
        }
    }
}

/// The lock around a component's state; what a [`ComponentRef`] points at
/// and what travels inside [`Value::Object`].
pub struct ComponentCell(Mutex<Component>);

fn lock_component(cell: &ComponentCell) -> MutexGuard<'_, Component> {
    cell.0.lock().unwrap_or_else(PoisonError::into_inner)
}

impl KeyValueCoding for ComponentCell {
    fn value_for_key(&self, key: &str) -> Value {
        let found = {
            let component = lock_component(self);
            component
                .builtin_value(key)
                .or_else(|| component.behavior.value_for_key(key))
        };
        match found {
            Some(value) => value,
            None => self.handle_query_with_unbound_key(key),
        }
    }

    fn take_value_for_key(&self, value: Value, key: &str) -> std::result::Result<(), KvcError> {
        if matches!(key, "name" | "parent" | "session") {
            return Err(KvcError::ReadOnly { key: key.to_owned() });
        }
        let rejected = lock_component(self).behavior.take_value_for_key(value, key);
        match rejected {
            Ok(()) => Ok(()),
            Err(value) => self.handle_take_value_for_unbound_key(value, key),
        }
    }

    fn handle_query_with_unbound_key(&self, key: &str) -> Value {
        lock_component(self).extra.value(key)
    }

    fn handle_take_value_for_unbound_key(&self, value: Value, key: &str) -> std::result::Result<(), KvcError> {
        lock_component(self).extra.set_object_for_key(value, key);
        Ok(())
    }

    fn description(&self) -> String {
        match self.0.try_lock() {
            Ok(component) => format!("<{}>", component.name),
            Err(_) => "<component (busy)>".to_owned(),
        }
    }

    fn into_any(self: Arc<Self>) -> Option<Arc<dyn Any + Send + Sync>> {
        Some(self)
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Shared handle to a component.
#[derive(Clone)]
pub struct ComponentRef(Arc<ComponentCell>);

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentRef({})", self.0.description())
    }
}

impl PartialEq for ComponentRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ComponentRef {}

impl ComponentRef {
    pub fn new(component: Component) -> Self {
        Self(Arc::new(ComponentCell(Mutex::new(component))))
    }

    fn lock(&self) -> MutexGuard<'_, Component> {
        lock_component(&self.0)
    }

    /// Identity comparison.
    #[inline]
    pub fn ptr_eq(&self, other: &ComponentRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn name(&self) -> String {
        self.lock().name.clone()
    }

    pub fn definition(&self) -> Arc<ComponentDefinition> {
        Arc::clone(&self.lock().definition)
    }

    /// The component as a key-value coding object.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Recover a handle from a value produced by [`ComponentRef::to_value`].
    pub fn from_value(value: &Value) -> Option<ComponentRef> {
        let any = value.as_object()?.clone().into_any()?;
        any.downcast::<ComponentCell>().ok().map(ComponentRef)
    }

    pub fn context_id(&self) -> Option<String> {
        self.lock().context_id.clone()
    }

    pub fn is_awake(&self) -> bool {
        self.lock().awake
    }

    pub fn is_awake_in(&self, ctx: &Context) -> bool {
        let component = self.lock();
        component.awake && component.context_id.as_deref() == Some(ctx.context_id())
    }

    pub fn is_stateless(&self) -> bool {
        self.lock().behavior.is_stateless()
    }

    pub fn synchronizes_variables_with_bindings(&self) -> bool {
        self.lock().behavior.synchronizes_variables_with_bindings()
    }

    /// Snapshot of the dynamic property bag.
    pub fn extra_attributes(&self) -> Attributes {
        self.lock().extra.clone()
    }

    pub fn bindings(&self) -> Option<Bindings> {
        self.lock().bindings.clone()
    }

    pub fn set_bindings(&self, bindings: Option<Bindings>) {
        self.lock().bindings = bindings;
    }

    pub fn has_binding(&self, name: &str) -> bool {
        self.lock()
            .bindings
            .as_ref()
            .is_some_and(|b| b.contains_key(name))
    }

    pub fn parent(&self) -> Option<ComponentRef> {
        self.lock()
            .parent
            .as_ref()
            .and_then(Weak::upgrade)
            .map(ComponentRef)
    }

    pub fn set_parent(&self, parent: Option<&ComponentRef>) {
        self.lock().parent = parent.map(|p| Arc::downgrade(&p.0));
    }

    pub fn resource_manager(&self) -> Option<Arc<dyn ResourceManager>> {
        self.lock().resource_manager.clone()
    }

    pub fn session(&self) -> Option<SessionRef> {
        self.lock()
            .session
            .as_ref()
            .and_then(Weak::upgrade)
            .map(SessionRef::from_arc)
    }

    /// Run `f` against the concrete behavior, if it is a `B`.
    pub fn with_behavior<B: 'static, R>(&self, f: impl FnOnce(&mut B) -> R) -> Option<R> {
        let mut component = self.lock();
        component.behavior.as_mut().as_any_mut().downcast_mut::<B>().map(f)
    }

    // --- bindings ---

    /// Evaluate binding `name` against the parent, regardless of sync mode.
    pub fn value_for_binding(&self, name: &str) -> Value {
        let (assoc, parent) = {
            let component = self.lock();
            let assoc = component.bindings.as_ref().and_then(|b| b.get(name).cloned());
            (assoc, component.parent.as_ref().and_then(Weak::upgrade))
        };
        match (assoc, parent) {
            (Some(assoc), Some(parent)) => assoc.value_in_component(parent.as_ref()),
            (Some(assoc), None) if assoc.is_value_constant() => {
                assoc.value_in_component(&Record::new("detached"))
            }
            _ => Value::Null,
        }
    }

    /// Push `value` through binding `name` into the parent.
    pub fn set_value_for_binding(&self, value: Value, name: &str) -> Result<()> {
        let (assoc, parent) = {
            let component = self.lock();
            let assoc = component.bindings.as_ref().and_then(|b| b.get(name).cloned());
            (assoc, component.parent.as_ref().and_then(Weak::upgrade))
        };
        if let (Some(assoc), Some(parent)) = (assoc, parent) {
            assoc.set_value(value, parent.as_ref())?;
        }
        Ok(())
    }

    /// Pull every bound value from `parent` into this component.
    pub fn sync_from_parent(&self, parent: &ComponentRef) {
        let Some(bindings) = self.bindings() else {
            return;
        };
        for (name, assoc) in &bindings {
            let value = assoc.value_in_component(parent);
            if let Err(err) = self.take_value_for_key(value, name) {
                tracing::warn!(
                    target: "woframe::component",
                    component = %self.name(),
                    binding = %name,
                    error = %err,
                    "could not pull binding value from parent"
                );
            }
        }
    }

    /// Push every binding that is settable in `parent` back to it.
    pub fn sync_to_parent(&self, parent: &ComponentRef) {
        let Some(bindings) = self.bindings() else {
            return;
        };
        for (name, assoc) in &bindings {
            if !assoc.is_value_settable_in_component(parent) {
                continue;
            }
            let value = self.value_for_key(name);
            if let Err(err) = assoc.set_value(value, parent) {
                tracing::warn!(
                    target: "woframe::component",
                    component = %self.name(),
                    binding = %name,
                    error = %err,
                    "could not push binding value to parent"
                );
            }
        }
    }

    /// Pull from the context's parent component, unless opted out.
    pub fn pull_values_from_parent(&self, ctx: &Context) {
        if !self.synchronizes_variables_with_bindings() {
            return;
        }
        if let Some(parent) = ctx.parent_component() {
            self.sync_from_parent(&parent);
        }
    }

    /// Push to the context's parent component, unless opted out.
    pub fn push_values_to_parent(&self, ctx: &Context) {
        if !self.synchronizes_variables_with_bindings() {
            return;
        }
        if let Some(parent) = ctx.parent_component() {
            self.sync_to_parent(&parent);
        }
    }

    // --- lifecycle ---

    /// Bind to `ctx` and wake up; a no-op if already awake in `ctx`.
    pub fn ensure_awake_in_context(&self, ctx: &mut Context) {
        let children = {
            let mut component = self.lock();
            if component.awake && component.context_id.as_deref() == Some(ctx.context_id()) {
                return;
            }
            component.context_id = Some(ctx.context_id().to_owned());
            if let Some(session) = ctx.existing_session() {
                component.session = Some(session.downgrade());
            }
            component.awake = true;
            component.resolved_children()
        };

        ctx.add_awake_component(self);
        for child in children {
            if !child.is_awake_in(ctx) {
                child.ensure_awake_in_context(ctx);
            }
        }
        self.lock().behavior.awake();
        tracing::trace!(target: "woframe::component", component = %self.name(), "awake");
    }

    /// Put the component (and its children) to sleep.
    pub fn sleep_with_context(&self, ctx: &Context) {
        let children = {
            let component = self.lock();
            if let Some(own) = component.context_id.as_deref() {
                if own != ctx.context_id() {
                    tracing::error!(
                        target: "woframe::component",
                        component = %component.name,
                        bound_context = own,
                        context = ctx.context_id(),
                        "refusing to sleep component in a foreign context"
                    );
                    return;
                }
            }
            component.awake.then(|| component.resolved_children())
        };

        if let Some(children) = children {
            for child in children {
                child.sleep_with_context(ctx);
            }
            let mut component = self.lock();
            component.behavior.sleep();
            if component.behavior.is_stateless() {
                component.extra.clear();
            }
            component.awake = false;
        }

        let mut component = self.lock();
        if !ctx.is_save_page_required() {
            component.context_id = None;
        }
        component.session = None;
    }

    /// Drop every context and session reference in the subtree, as done
    /// before a page goes into a cache.
    pub(crate) fn detach_from_context(&self) {
        let children = {
            let mut component = self.lock();
            component.context_id = None;
            component.session = None;
            component.resolved_children()
        };
        for child in children {
            child.detach_from_context();
        }
    }

    /// Attach a session created after this tree was woken.
    pub(crate) fn set_session_if_awake(&self, session: &SessionRef) {
        let children = {
            let mut component = self.lock();
            if !component.awake {
                return;
            }
            component.session = Some(session.downgrade());
            component.resolved_children()
        };
        for child in children {
            child.set_session_if_awake(session);
        }
    }

    fn reset_if_stateless(&self) {
        let mut component = self.lock();
        if component.behavior.is_stateless() {
            component.extra.clear();
        }
    }

    // --- children ---

    /// The live child in slot `key`, resolving its fault on first access.
    ///
    /// Returns the same instance on every later call. `None` means there
    /// is no such slot or the fault could not be resolved (see
    /// [`ComponentRef::unresolved_child`]).
    pub fn child_component_with_name(&self, key: &str, ctx: &mut Context) -> Option<ComponentRef> {
        let (slot, own_rm) = {
            let component = self.lock();
            (component.children.get(key).cloned(), component.resource_manager.clone())
        };

        let fault = match slot? {
            Child::Resolved(child) => return Some(child),
            Child::Fault(fault) => fault,
        };

        let fallback = own_rm.or_else(|| Some(ctx.application().resource_manager()));
        let child = match fault.resolve(fallback, ctx) {
            Ok(child) => child,
            Err(err) => {
                tracing::error!(
                    target: "woframe::component",
                    parent = %self.name(),
                    child = key,
                    error = %err,
                    "could not resolve component fault"
                );
                return None;
            }
        };

        child.set_parent(Some(self));
        child.ensure_awake_in_context(ctx);
        self.lock()
            .children
            .insert(key.to_owned(), Child::Resolved(child.clone()));
        tracing::debug!(
            target: "woframe::component",
            parent = %self.name(),
            child = key,
            component = %fault.component_name(),
            "resolved component fault"
        );
        Some(child)
    }

    /// The fault still sitting in slot `key`, if it has not been resolved.
    pub fn unresolved_child(&self, key: &str) -> Option<ComponentFault> {
        match self.lock().children.get(key) {
            Some(Child::Fault(fault)) => Some(fault.clone()),
            _ => None,
        }
    }

    pub fn child_keys(&self) -> Vec<String> {
        self.lock().children.keys().cloned().collect()
    }

    // --- actions ---

    /// Run the registered action `name`.
    pub fn perform_action_named(&self, name: &str, ctx: &mut Context) -> Result<ActionResult> {
        let action = self.lock().definition.action(name).cloned();
        match action {
            Some(action) => {
                tracing::debug!(target: "woframe::component", component = %self.name(), action = name, "perform action");
                action(self, ctx)
            }
            None => Err(ComponentError::MissingAction {
                component: self.name(),
                action: name.to_owned(),
            }
            .into()),
        }
    }

    /// POSTs and requests carrying form values go through take-values.
    pub fn should_take_values_from_request(&self, request: &Request) -> bool {
        request.is_post() || request.has_form_values()
    }

    /// Form value `name` of the context's request, or `default`.
    pub fn form_value(&self, ctx: &Context, name: &str, default: &str) -> String {
        ctx.request()
            .form_value(name)
            .unwrap_or(default)
            .to_owned()
    }

    fn template(&self) -> ElementRef {
        Arc::clone(self.lock().definition.template())
    }
}

impl KeyValueCoding for ComponentRef {
    fn value_for_key(&self, key: &str) -> Value {
        self.0.value_for_key(key)
    }

    fn take_value_for_key(&self, value: Value, key: &str) -> std::result::Result<(), KvcError> {
        self.0.take_value_for_key(value, key)
    }

    fn description(&self) -> String {
        self.0.description()
    }
}

impl Element for ComponentRef {
    fn take_values_from_request(&self, request: &Request, ctx: &mut Context) -> Result<()> {
        self.template().take_values_from_request(request, ctx)
    }

    fn invoke_action(&self, request: &Request, ctx: &mut Context) -> Result<ActionResult> {
        self.template().invoke_action(request, ctx)
    }

    fn append_to_response(&self, response: &mut Response, ctx: &mut Context) -> Result<()> {
        let outcome = self.template().append_to_response(response, ctx);
        self.reset_if_stateless();
        outcome
    }

    fn walk_template(&self, walker: &mut dyn ElementWalker, ctx: &mut Context) -> Result<()> {
        let template = self.template();
        let outcome = walker.process_template(self, template.as_ref(), ctx).map(|_| ());
        self.reset_if_stateless();
        outcome
    }
}
