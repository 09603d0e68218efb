//! The policy registry: which parameters, fields and errors are treated how.
//!
//! A [`PolicyRegistry`] is built once at startup with
//! [`PolicyRegistry::builder`] and then shared read-only behind an `Arc`.
//! Lookups are memoized in concurrent maps owned by the registry. A memo
//! entry is computed at most once per key and never invalidated.
//!
//! ```rust
//! use masklog::{
//!     ExceptionRule, Level, MaskSpec, MethodDescriptor, MethodPolicies, OperationConfig,
//!     PolicyRegistry, RedactionPolicy,
//! };
//!
//! let login = MethodDescriptor::new("app::AuthService", "login")
//!     .param("email", "String")
//!     .param("password", "String");
//!
//! let registry = PolicyRegistry::builder()
//!     .method(
//!         login.clone(),
//!         MethodPolicies::new()
//!             .mask(0, MaskSpec::default())
//!             .exclude(1)
//!             .config(OperationConfig::new("User {0} logged in").with_level(Level::Info)),
//!     )
//!     .build()?;
//!
//! assert_eq!(registry.policy_for_parameter(&login, 1), RedactionPolicy::Exclude);
//! # Ok::<(), masklog::RegistryError>(())
//! ```

use std::{
    any::type_name,
    borrow::Cow,
    collections::{hash_map::Entry, BTreeMap, HashMap},
    error::Error,
    fmt,
    sync::Arc,
};

use dashmap::DashMap;

use crate::{
    descriptor::{FieldDescriptor, MethodDescriptor},
    error::RegistryError,
    level::Level,
    operation::cause_chain,
    policy::{MaskSpec, RedactionPolicy},
    render::{FieldPolicies, FieldPolicy},
};

// =============================================================================
// Exception rules
// =============================================================================

type ErrorPredicate = dyn Fn(&(dyn Error + 'static)) -> bool + Send + Sync;

/// How one class of errors is reported by the operation logger.
///
/// Rules attached to a method are evaluated in declaration order and the
/// first match wins, even when a later rule is more specific.
#[derive(Clone)]
pub struct ExceptionRule {
    name: Cow<'static, str>,
    matcher: Arc<ErrorPredicate>,
    message: String,
    level: Level,
    print_trace: bool,
}

impl ExceptionRule {
    /// Matches errors whose concrete type is exactly `E`.
    #[must_use]
    pub fn for_type<E: Error + 'static>() -> Self {
        Self::matching(type_name::<E>(), |error| error.is::<E>())
    }

    /// Matches errors that are `E` or have an `E` anywhere in their cause
    /// chain.
    #[must_use]
    pub fn caused_by<E: Error + 'static>() -> Self {
        Self::matching(format!("caused by {}", type_name::<E>()), |error| {
            cause_chain(error).into_iter().any(|link| link.is::<E>())
        })
    }

    /// Matches every error.
    #[must_use]
    pub fn any() -> Self {
        Self::matching("any", |_| true)
    }

    /// Matches errors accepted by `predicate`; `name` identifies the rule in
    /// debug output.
    #[must_use]
    pub fn matching<F>(name: impl Into<Cow<'static, str>>, predicate: F) -> Self
    where
        F: Fn(&(dyn Error + 'static)) -> bool + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            matcher: Arc::new(predicate),
            message: String::new(),
            level: Level::Error,
            print_trace: false,
        }
    }

    /// Message template for matched errors; `{0}`, `{1}` name arguments.
    ///
    /// An empty template logs the root-cause message instead.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Appends the cause chain to the record.
    #[must_use]
    pub fn with_print_trace(mut self, print_trace: bool) -> Self {
        self.print_trace = print_trace;
        self
    }

    pub fn matches(&self, error: &(dyn Error + 'static)) -> bool {
        (self.matcher)(error)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn level(&self) -> Level {
        self.level
    }

    pub const fn print_trace(&self) -> bool {
        self.print_trace
    }
}

impl fmt::Debug for ExceptionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExceptionRule")
            .field("matcher", &self.name)
            .field("message", &self.message)
            .field("level", &self.level)
            .field("print_trace", &self.print_trace)
            .finish()
    }
}

// =============================================================================
// Operation configuration
// =============================================================================

/// Declarative logging configuration of one operation.
///
/// With the `serde` feature, everything except the exception rules can be
/// loaded from configuration; missing keys take their defaults.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OperationConfig {
    /// Template rendered before the call; `{0}`, `{1}` name arguments.
    pub message: String,
    /// Level of entry and exit records.
    pub level: Level,
    /// Emit an entry record with the redacted arguments.
    pub include_args: bool,
    /// Emit an exit record with the redacted result and duration.
    pub include_result: bool,
    /// Rules evaluated in order against a failed call's error.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub exceptions: Vec<ExceptionRule>,
    /// Report errors even when no rule is declared.
    pub log_unexpected_exceptions: bool,
    /// Level of errors that match no rule.
    pub unexpected_level: Level,
}

impl Default for OperationConfig {
    fn default() -> Self {
        Self {
            message: String::new(),
            level: Level::Info,
            include_args: true,
            include_result: true,
            exceptions: Vec::new(),
            log_unexpected_exceptions: true,
            unexpected_level: Level::Error,
        }
    }
}

impl OperationConfig {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    #[must_use]
    pub fn with_include_args(mut self, include_args: bool) -> Self {
        self.include_args = include_args;
        self
    }

    #[must_use]
    pub fn with_include_result(mut self, include_result: bool) -> Self {
        self.include_result = include_result;
        self
    }

    /// Appends an exception rule after those already declared.
    #[must_use]
    pub fn with_exception(mut self, rule: ExceptionRule) -> Self {
        self.exceptions.push(rule);
        self
    }

    #[must_use]
    pub fn with_log_unexpected_exceptions(mut self, enabled: bool) -> Self {
        self.log_unexpected_exceptions = enabled;
        self
    }

    #[must_use]
    pub fn with_unexpected_level(mut self, level: Level) -> Self {
        self.unexpected_level = level;
        self
    }
}

// =============================================================================
// Registration
// =============================================================================

/// Parameter policies and configuration declared for one method.
#[derive(Clone, Debug, Default)]
pub struct MethodPolicies {
    params: BTreeMap<usize, RedactionPolicy>,
    config: Option<OperationConfig>,
}

impl MethodPolicies {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the policy of the parameter at `index`; a later call for the same
    /// index replaces the earlier one.
    #[must_use]
    pub fn policy(mut self, index: usize, policy: RedactionPolicy) -> Self {
        self.params.insert(index, policy);
        self
    }

    #[must_use]
    pub fn mask(self, index: usize, spec: MaskSpec) -> Self {
        self.policy(index, RedactionPolicy::Mask(spec))
    }

    #[must_use]
    pub fn exclude(self, index: usize) -> Self {
        self.policy(index, RedactionPolicy::Exclude)
    }

    #[must_use]
    pub fn config(mut self, config: OperationConfig) -> Self {
        self.config = Some(config);
        self
    }
}

#[derive(Debug)]
struct MethodEntry {
    descriptor: Arc<MethodDescriptor>,
    params: Vec<RedactionPolicy>,
    config: Option<Arc<OperationConfig>>,
}

/// Collects registrations; validated by [`PolicyRegistryBuilder::build`].
#[derive(Debug, Default)]
pub struct PolicyRegistryBuilder {
    methods: Vec<(MethodDescriptor, MethodPolicies)>,
    type_configs: Vec<(String, OperationConfig)>,
    records: Vec<(&'static str, &'static [FieldPolicy])>,
}

impl PolicyRegistryBuilder {
    /// Registers a method with its parameter policies and configuration.
    #[must_use]
    pub fn method(mut self, descriptor: MethodDescriptor, policies: MethodPolicies) -> Self {
        self.methods.push((descriptor, policies));
        self
    }

    /// Default configuration for methods of `declaring_type` that declare
    /// none of their own.
    #[must_use]
    pub fn type_config(mut self, declaring_type: impl Into<String>, config: OperationConfig) -> Self {
        self.type_configs.push((declaring_type.into(), config));
        self
    }

    /// [`type_config`](Self::type_config) keyed by `std::any::type_name::<T>()`.
    #[must_use]
    pub fn type_config_for<T: ?Sized>(self, config: OperationConfig) -> Self {
        self.type_config(type_name::<T>(), config)
    }

    /// Makes the field policies of `T` reachable through
    /// [`PolicyRegistry::policy_for_field_descriptor`].
    #[must_use]
    pub fn record<T: FieldPolicies>(mut self) -> Self {
        self.records.push((type_name::<T>(), T::FIELD_POLICIES));
        self
    }

    /// Validates the registrations and freezes them.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] if a method or type is registered twice, or
    /// if a parameter policy targets an index the method does not declare.
    pub fn build(self) -> Result<PolicyRegistry, RegistryError> {
        let mut methods = Vec::with_capacity(self.methods.len());
        let mut index = HashMap::with_capacity(self.methods.len());

        for (descriptor, policies) in self.methods {
            let declared = descriptor.arity();
            if let Some((&out_of_range, _)) = policies.params.range(declared..).next() {
                return Err(RegistryError::ParameterOutOfRange {
                    method: descriptor.to_string(),
                    index: out_of_range,
                    declared,
                });
            }

            let mut params = vec![RedactionPolicy::None; declared];
            for (position, policy) in policies.params {
                params[position] = policy;
            }

            let descriptor = Arc::new(descriptor);
            match index.entry(Arc::clone(&descriptor)) {
                Entry::Occupied(_) => {
                    return Err(RegistryError::DuplicateMethod(descriptor.to_string()));
                }
                Entry::Vacant(slot) => {
                    slot.insert(methods.len());
                }
            }
            methods.push(MethodEntry {
                descriptor,
                params,
                config: policies.config.map(Arc::new),
            });
        }

        let mut type_configs = HashMap::with_capacity(self.type_configs.len());
        for (declaring_type, config) in self.type_configs {
            match type_configs.entry(declaring_type) {
                Entry::Occupied(slot) => {
                    return Err(RegistryError::DuplicateTypeConfig(slot.key().clone()));
                }
                Entry::Vacant(slot) => {
                    slot.insert(Arc::new(config));
                }
            }
        }

        Ok(PolicyRegistry {
            methods,
            index,
            type_configs,
            records: self.records.into_iter().collect(),
            parameter_cache: DashMap::new(),
            field_cache: DashMap::new(),
        })
    }
}

// =============================================================================
// Registry
// =============================================================================

/// Immutable policy table with memoized lookups.
#[derive(Debug)]
pub struct PolicyRegistry {
    methods: Vec<MethodEntry>,
    index: HashMap<Arc<MethodDescriptor>, usize>,
    type_configs: HashMap<String, Arc<OperationConfig>>,
    records: HashMap<&'static str, &'static [FieldPolicy]>,
    parameter_cache: DashMap<(Arc<MethodDescriptor>, usize), RedactionPolicy>,
    field_cache: DashMap<(&'static str, String), RedactionPolicy>,
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::empty()
    }
}

impl PolicyRegistry {
    #[must_use]
    pub fn builder() -> PolicyRegistryBuilder {
        PolicyRegistryBuilder::default()
    }

    /// A registry without registrations: every lookup yields the default.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            methods: Vec::new(),
            index: HashMap::new(),
            type_configs: HashMap::new(),
            records: HashMap::new(),
            parameter_cache: DashMap::new(),
            field_cache: DashMap::new(),
        }
    }

    fn entry(&self, method: &MethodDescriptor) -> Option<&MethodEntry> {
        self.index.get(method).map(|&position| &self.methods[position])
    }

    /// Policy of the parameter at `index`; unregistered methods and positions
    /// yield [`RedactionPolicy::None`].
    pub fn policy_for_parameter(&self, method: &MethodDescriptor, index: usize) -> RedactionPolicy {
        let Some(entry) = self.entry(method) else {
            return RedactionPolicy::None;
        };
        let key = (Arc::clone(&entry.descriptor), index);
        if let Some(policy) = self.parameter_cache.get(&key) {
            return *policy;
        }
        *self.parameter_cache.entry(key).or_insert_with(|| {
            entry
                .params
                .get(index)
                .copied()
                .unwrap_or(RedactionPolicy::None)
        })
    }

    /// Policies of the first `arity` parameters of `method`.
    pub fn parameter_policies(&self, method: &MethodDescriptor, arity: usize) -> Vec<RedactionPolicy> {
        (0..arity)
            .map(|index| self.policy_for_parameter(method, index))
            .collect()
    }

    /// Policy of field `name` on `T`, taken from its derived field table.
    pub fn policy_for_field<T: FieldPolicies>(&self, name: &str) -> RedactionPolicy {
        self.cached_field_policy(type_name::<T>(), T::FIELD_POLICIES, name)
    }

    /// Policy of a field of a type registered with
    /// [`PolicyRegistryBuilder::record`].
    pub fn policy_for_field_descriptor(&self, field: &FieldDescriptor) -> RedactionPolicy {
        self.records
            .get_key_value(field.declaring_type())
            .map_or(RedactionPolicy::None, |(&type_name, fields)| {
                self.cached_field_policy(type_name, fields, field.name())
            })
    }

    fn cached_field_policy(
        &self,
        type_name: &'static str,
        fields: &[FieldPolicy],
        name: &str,
    ) -> RedactionPolicy {
        let key = (type_name, name.to_string());
        if let Some(policy) = self.field_cache.get(&key) {
            return *policy;
        }
        *self.field_cache.entry(key).or_insert_with(|| {
            fields
                .iter()
                .find(|field| field.name == name)
                .map_or(RedactionPolicy::None, |field| field.policy)
        })
    }

    /// The method's own configuration, else its type's default.
    pub fn operation_config(&self, method: &MethodDescriptor) -> Option<Arc<OperationConfig>> {
        self.entry(method)
            .and_then(|entry| entry.config.clone())
            .or_else(|| self.type_configs.get(method.declaring_type()).cloned())
    }

    /// Exception rules of the method's effective configuration, in order.
    pub fn exception_rules(&self, method: &MethodDescriptor) -> &[ExceptionRule] {
        self.entry(method)
            .and_then(|entry| entry.config.as_deref())
            .or_else(|| self.type_configs.get(method.declaring_type()).map(|config| &**config))
            .map(|config| config.exceptions.as_slice())
            .unwrap_or_default()
    }

    /// First registered method whose simple type name is `owner` and whose
    /// name is `method`.
    ///
    /// Two registrations may share both; the earlier one wins.
    pub fn find_by_frame(&self, owner: &str, method: &str) -> Option<Arc<MethodDescriptor>> {
        self.methods
            .iter()
            .find(|entry| {
                entry.descriptor.name() == method && entry.descriptor.simple_type_name() == owner
            })
            .map(|entry| Arc::clone(&entry.descriptor))
    }

    /// Registered methods in registration order.
    pub fn methods(&self) -> impl Iterator<Item = &MethodDescriptor> + '_ {
        self.methods.iter().map(|entry| entry.descriptor.as_ref())
    }

    pub fn is_registered(&self, method: &MethodDescriptor) -> bool {
        self.index.contains_key(method)
    }
}
