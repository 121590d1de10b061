//! The resource lifecycle engine.
//!
//! Every managed-resource operation passes through here on its way to a
//! [`Resource`](crate::resource::Resource) handler. The engine owns the
//! protocol rules so handlers don't have to:
//!
//! - write-only attributes are null in every state handed back to the host
//! - computed attributes the config leaves null are planned unknown, carrying
//!   any refinements the schema declares merged with those already present
//! - deferral requested at configure time short-circuits plan, read and import
//! - apply with `prior == planned` is a no-op that never reaches the handler
//! - handler failures become diagnostics and leave the prior state in place
//!
//! Values that do not match the resource schema on the way *in* are protocol
//! errors; values that do not match on the way *out* are provider bugs and
//! surface as [`ProviderError::SchemaMismatch`].

use tracing::{debug, error, info, instrument, warn};

use crate::error::ProviderError;
use crate::resource::{ImportTarget, JsonMap, ResourceType, Upgrader};
use crate::schema::{has_errors, Block, BlockNestingMode, Diagnostic, IdentitySchema};
use crate::session::SessionContext;
use crate::types::{
    ApplyResourceChangeRequest, ApplyResourceChangeResponse, Deferred, ImportResourceStateRequest,
    ImportResourceStateResponse, ImportedResource, MoveResourceStateRequest,
    MoveResourceStateResponse, PlanResourceChangeRequest, PlanResourceChangeResponse,
    ReadResourceRequest, ReadResourceResponse, UpgradeResourceIdentityRequest,
    UpgradeResourceIdentityResponse, UpgradeResourceStateRequest, UpgradeResourceStateResponse,
    ValidateResourceConfigRequest,
};
use crate::validation::{self, write_only_values};
use crate::value::{child_path, Type, Value};

/// Outcome of checking the session's deferral request.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Deferral {
    /// Proceed normally.
    Proceed,
    /// Return this deferral and skip the work.
    Defer(Deferred),
    /// Deferral was requested but the host can't accept it.
    Invalid(Diagnostic),
}

/// Decide whether the current call must be deferred.
pub(crate) fn check_deferral(ctx: &SessionContext) -> Deferral {
    if !ctx.deferral_requested() {
        return Deferral::Proceed;
    }
    if ctx.client_capabilities().deferral_allowed {
        Deferral::Defer(Deferred::provider_config_unknown())
    } else {
        Deferral::Invalid(
            Diagnostic::error("Invalid Deferred Response").with_detail(
                "The provider signaled a deferred response, \
                 but the host does not support deferrals. \
                 Remove the deferral setting from the provider configuration or upgrade the host.",
            ),
        )
    }
}

/// Null every write-only attribute of `value`, returning the paths that were set.
pub fn null_write_only(block: &Block, mut value: Value) -> (Value, Vec<String>) {
    let mut nulled = Vec::new();
    null_write_only_at(block, &mut value, "", &mut nulled);
    (value, nulled)
}

fn null_write_only_at(block: &Block, value: &mut Value, path: &str, nulled: &mut Vec<String>) {
    let Some(attrs) = value.as_object_mut() else {
        return;
    };
    for (name, attr) in &block.attributes {
        if !attr.flags.write_only {
            continue;
        }
        if let Some(v) = attrs.get_mut(name) {
            if !v.is_null() {
                nulled.push(child_path(path, name));
                *v = Value::null(attr.attr_type.clone());
            }
        }
    }
    for (name, nested) in &block.blocks {
        if !nested.block.has_write_only() {
            continue;
        }
        let Some(inner) = attrs.get_mut(name) else {
            continue;
        };
        let nested_path = child_path(path, name);
        match (nested.nesting_mode, inner) {
            (BlockNestingMode::Single, inner) => {
                null_write_only_at(&nested.block, inner, &nested_path, nulled)
            }
            (BlockNestingMode::List, Value::List(_, items))
            | (BlockNestingMode::Set, Value::Set(_, items)) => {
                for (i, item) in items.iter_mut().enumerate() {
                    let item_path = child_path(&nested_path, &i.to_string());
                    null_write_only_at(&nested.block, item, &item_path, nulled);
                }
            }
            (BlockNestingMode::Map, Value::Map(_, items)) => {
                for (key, item) in items.iter_mut() {
                    null_write_only_at(&nested.block, item, &child_path(&nested_path, key), nulled);
                }
            }
            _ => {}
        }
    }
}

/// An object of `ty` with every attribute null.
pub(crate) fn null_object(ty: &Type) -> Value {
    match ty.attribute_types() {
        Some(attrs) => Value::Object(
            attrs
                .iter()
                .map(|(name, ty)| (name.clone(), Value::null(ty.clone())))
                .collect(),
        ),
        None => Value::null(ty.clone()),
    }
}

fn check_input(value: &Value, ty: &Type, what: &str) -> Result<(), ProviderError> {
    value.check_type(ty, what)?;
    Ok(())
}

fn check_output(rt: &ResourceType, value: &Value, what: &str) -> Result<(), ProviderError> {
    value.check_type(&rt.state_type, "").map_err(|err| {
        ProviderError::SchemaMismatch(format!("{} for \"{}\" {}", what, rt.name, err))
    })
}

fn scrub(rt: &ResourceType, value: Value) -> Value {
    if rt.enforce_write_only {
        null_write_only(&rt.schema.block, value).0
    } else {
        value
    }
}

fn derive_identity(rt: &ResourceType, state: &Value) -> Result<Option<Value>, ProviderError> {
    let Some(identity_schema) = &rt.identity_schema else {
        return Ok(None);
    };
    if state.is_null() {
        return Ok(None);
    }
    match rt.handler.identity(state) {
        Some(identity) if identity.is_fully_known() => {
            identity
                .check_type(&identity_schema.implied_type(), "")
                .map_err(|err| {
                    ProviderError::SchemaMismatch(format!("identity for \"{}\" {}", rt.name, err))
                })?;
            Ok(Some(identity))
        }
        _ => Ok(None),
    }
}

/// Validate a resource configuration.
#[instrument(
    skip(rt, ctx, req),
    fields(type_name = %rt.name),
    name = "core.validate_resource_config"
)]
pub async fn validate_resource_config(
    rt: &ResourceType,
    ctx: &SessionContext,
    req: ValidateResourceConfigRequest,
) -> Result<Vec<Diagnostic>, ProviderError> {
    check_input(&req.config, &rt.state_type, "config")?;
    let mut diagnostics = validation::validate(&rt.schema, &req.config);

    if !ctx.client_capabilities().write_only_attributes_allowed {
        for path in write_only_values(&rt.schema.block, &req.config) {
            diagnostics.push(
                Diagnostic::error("Write-only Attribute Not Allowed")
                    .with_detail(format!(
                        "The resource \"{}\" contains a non-null value \
                         for write-only attribute \"{}\", \
                         but the host does not support write-only attributes.",
                        rt.name, path
                    ))
                    .with_attribute(path),
            );
        }
    }

    match ctx.run(rt.handler.validate_config(ctx, &req.config)).await {
        Ok(extra) => diagnostics.extend(extra),
        Err(e) => diagnostics.push(e.to_diagnostic()),
    }

    if has_errors(&diagnostics) {
        warn!(diagnostics = diagnostics.len(), "ValidateResourceConfig completed with errors");
    } else {
        debug!("ValidateResourceConfig completed successfully");
    }
    Ok(diagnostics)
}

/// Re-type stored JSON under the current version, running upgraders as needed.
fn upgrade_json(
    what: &str,
    ty: &Type,
    current: u64,
    stored: u64,
    raw: serde_json::Value,
    upgraders: &[Upgrader],
) -> Result<Value, Diagnostic> {
    let summary = format!("Unable to Upgrade {}", what);
    if stored > current {
        return Err(Diagnostic::error(summary).with_detail(format!(
            "The stored {} has version {}, which is newer than the provider's version {}. \
             Upgrade the provider to a version that understands it.",
            what.to_lowercase(),
            stored,
            current
        )));
    }
    if stored == current || raw.is_null() {
        return Value::from_json_permissive(ty, &raw)
            .map_err(|err| Diagnostic::error(summary).with_detail(err.to_string()));
    }

    let mut attrs: JsonMap = match raw {
        serde_json::Value::Object(map) => map,
        other => {
            return Err(Diagnostic::error(summary)
                .with_detail(format!("expected a JSON object, got {}", other)))
        }
    };
    for version in stored..current {
        let Some(upgrader) = upgraders.iter().find(|u| u.from_version == version) else {
            return Err(Diagnostic::error(summary)
                .with_detail(format!("no upgrader for version {}", version)));
        };
        debug!(from_version = version, "running upgrader");
        attrs = upgrader
            .apply(attrs)
            .map_err(|err| Diagnostic::error(summary.clone()).with_detail(err.message()))?;
    }
    Value::from_json(ty, &serde_json::Value::Object(attrs))
        .map_err(|err| Diagnostic::error(summary).with_detail(err.to_string()))
}

/// Upgrade stored state to the current schema version.
#[instrument(
    skip(rt, ctx, req),
    fields(type_name = %rt.name, version = req.version),
    name = "core.upgrade_resource_state"
)]
pub async fn upgrade_resource_state(
    rt: &ResourceType,
    ctx: &SessionContext,
    req: UpgradeResourceStateRequest,
) -> Result<UpgradeResourceStateResponse, ProviderError> {
    ctx.check_cancelled()?;
    let upgraded = upgrade_json(
        "Resource State",
        &rt.state_type,
        rt.schema.version,
        req.version,
        req.raw_state,
        &rt.state_upgraders,
    );

    let state = match upgraded {
        Ok(state) => state,
        Err(diagnostic) => {
            error!(summary = %diagnostic.summary, "UpgradeResourceState failed");
            return Ok(UpgradeResourceStateResponse {
                upgraded_state: None,
                diagnostics: vec![diagnostic],
            });
        }
    };

    let mut diagnostics = Vec::new();
    let state = if rt.enforce_write_only {
        let (state, nulled) = null_write_only(&rt.schema.block, state);
        if !nulled.is_empty() {
            warn!(attributes = ?nulled, "stored state carried write-only values");
            diagnostics.push(
                Diagnostic::warning("Write-only Attribute Removed From State").with_detail(format!(
                    "The stored state for \"{}\" contained values for write-only attributes ({}). \
                     They have been removed.",
                    rt.name,
                    nulled.join(", ")
                )),
            );
        }
        state
    } else {
        state
    };

    info!(
        from_version = req.version,
        to_version = rt.schema.version,
        "UpgradeResourceState completed"
    );
    Ok(UpgradeResourceStateResponse {
        upgraded_state: Some(state),
        diagnostics,
    })
}

/// Refresh a resource from its remote object.
#[instrument(skip(rt, ctx, req), fields(type_name = %rt.name), name = "core.read_resource")]
pub async fn read_resource(
    rt: &ResourceType,
    ctx: &SessionContext,
    req: ReadResourceRequest,
) -> Result<ReadResourceResponse, ProviderError> {
    check_input(&req.current_state, &rt.state_type, "current_state")?;
    let mut resp = ReadResourceResponse {
        new_state: req.current_state.clone(),
        diagnostics: Vec::new(),
        private: req.private,
        deferred: None,
        new_identity: req.current_identity.clone(),
    };

    match check_deferral(ctx) {
        Deferral::Proceed => {}
        Deferral::Defer(deferred) => {
            info!("ReadResource deferred");
            resp.deferred = Some(deferred);
            return Ok(resp);
        }
        Deferral::Invalid(diagnostic) => {
            resp.diagnostics.push(diagnostic);
            return Ok(resp);
        }
    }

    if req.current_state.is_null() {
        debug!("ReadResource called with null state");
        return Ok(resp);
    }

    match ctx.run(rt.handler.read(ctx, &req.current_state)).await {
        Ok(Some(state)) => {
            check_output(rt, &state, "read state")?;
            let state = scrub(rt, state);
            let identity = derive_identity(rt, &state)?;
            if let (Some(current), Some(new)) = (&req.current_identity, &identity) {
                if !current.is_null() && current != new {
                    resp.diagnostics.push(
                        Diagnostic::error("Unexpected Identity Change").with_detail(format!(
                            "The identity of \"{}\" changed during read from {} to {}. \
                             Identities must not change.",
                            rt.name, current, new
                        )),
                    );
                }
            }
            if identity.is_some() {
                resp.new_identity = identity;
            }
            resp.new_state = state;
            debug!("ReadResource completed successfully");
        }
        Ok(None) => {
            info!("remote object no longer exists");
            resp.new_state = Value::null(rt.state_type.clone());
            resp.new_identity = None;
        }
        Err(e) => {
            error!(error = %e, "ReadResource failed");
            resp.diagnostics.push(e.to_diagnostic());
        }
    }
    Ok(resp)
}

/// Mark computed attributes the config leaves null, and merge refinements
/// into unknowns that arrived with the proposal.
fn plan_computed(rt: &ResourceType, prior: &Value, config: &Value, planned: &mut Value) {
    let changed = prior.is_null() || prior != &*planned;
    let Some(attrs) = planned.as_object_mut() else {
        return;
    };
    for (name, attr) in &rt.schema.block.attributes {
        let refinements = attr.unknown_refinements();
        let config_null = config.get_attr(name).map_or(true, Value::is_null);
        let Some(current) = attrs.get_mut(name) else {
            continue;
        };

        if attr.flags.computed && config_null && changed {
            let prior_value = prior.get_attr(name);
            if let (true, Some(prior_value)) = (attr.uses_state_for_unknown(), prior_value) {
                if !prior_value.is_null() {
                    *current = prior_value.clone();
                    continue;
                }
            }
            if let Some(default) = attr.default_value() {
                *current = default;
                continue;
            }
            let arrived = current.refinements().cloned().unwrap_or_default();
            let refined = arrived.intersect(&refinements);
            *current = Value::unknown_refined(attr.attr_type.clone(), refined);
        } else if let Value::Unknown(ty, arrived) = current {
            if !refinements.is_empty() {
                let refined = Value::unknown_refined(ty.clone(), arrived.intersect(&refinements));
                *current = refined;
            }
        }
    }
}

fn replace_paths(rt: &ResourceType, prior: &Value, planned: &Value) -> Vec<String> {
    if prior.is_null() {
        return Vec::new();
    }
    rt.schema
        .block
        .attributes
        .iter()
        .filter(|(_, attr)| attr.requires_replace())
        .filter(|(name, _)| prior.get_attr(name) != planned.get_attr(name))
        .map(|(name, _)| name.clone())
        .collect()
}

/// Plan a change to a resource.
#[instrument(skip(rt, ctx, req), fields(type_name = %rt.name), name = "core.plan_resource_change")]
pub async fn plan_resource_change(
    rt: &ResourceType,
    ctx: &SessionContext,
    req: PlanResourceChangeRequest,
) -> Result<PlanResourceChangeResponse, ProviderError> {
    check_input(&req.prior_state, &rt.state_type, "prior_state")?;
    check_input(&req.proposed_new_state, &rt.state_type, "proposed_new_state")?;
    check_input(&req.config, &rt.state_type, "config")?;

    let is_create = req.prior_state.is_null();
    debug!(is_create, "PlanResourceChange called");

    let mut resp = PlanResourceChangeResponse {
        planned_state: scrub(rt, req.proposed_new_state.clone()),
        requires_replace: Vec::new(),
        planned_private: req.prior_private.clone(),
        diagnostics: Vec::new(),
        legacy_type_system: rt.legacy_type_system,
        deferred: None,
        planned_identity: req.prior_identity.clone(),
    };

    match check_deferral(ctx) {
        Deferral::Proceed => {}
        Deferral::Defer(deferred) => {
            info!("PlanResourceChange deferred");
            resp.deferred = Some(deferred);
            return Ok(resp);
        }
        Deferral::Invalid(diagnostic) => {
            warn!("deferral requested but not allowed by the host");
            resp.diagnostics.push(diagnostic);
            return Ok(resp);
        }
    }

    if req.proposed_new_state.is_null() {
        info!("PlanResourceChange planned destroy");
        resp.planned_identity = None;
        return Ok(resp);
    }

    let mut planned = req.proposed_new_state.clone();
    plan_computed(rt, &req.prior_state, &req.config, &mut planned);

    match ctx
        .run(rt.handler.modify_plan(ctx, &req.prior_state, &req.config, planned.clone()))
        .await
    {
        Ok(modified) => {
            check_output(rt, &modified, "planned state")?;
            planned = modified;
        }
        Err(e) => {
            error!(error = %e, "ModifyPlan failed");
            resp.diagnostics.push(e.to_diagnostic());
        }
    }

    let planned = scrub(rt, planned);
    resp.requires_replace = replace_paths(rt, &req.prior_state, &planned);
    if let Some(identity) = derive_identity(rt, &planned)? {
        resp.planned_identity = Some(identity);
    }
    resp.planned_state = planned;

    info!(
        is_create,
        requires_replace = resp.requires_replace.len(),
        "PlanResourceChange completed"
    );
    Ok(resp)
}

/// Apply a planned change.
#[instrument(skip(rt, ctx, req), fields(type_name = %rt.name), name = "core.apply_resource_change")]
pub async fn apply_resource_change(
    rt: &ResourceType,
    ctx: &SessionContext,
    req: ApplyResourceChangeRequest,
) -> Result<ApplyResourceChangeResponse, ProviderError> {
    check_input(&req.prior_state, &rt.state_type, "prior_state")?;
    check_input(&req.planned_state, &rt.state_type, "planned_state")?;
    check_input(&req.config, &rt.state_type, "config")?;

    let mut resp = ApplyResourceChangeResponse {
        new_state: req.prior_state.clone(),
        private: req.planned_private.clone(),
        diagnostics: Vec::new(),
        legacy_type_system: rt.legacy_type_system,
        new_identity: req.planned_identity.clone(),
    };

    let outcome = match (req.prior_state.is_null(), req.planned_state.is_null()) {
        (true, true) => {
            debug!("ApplyResourceChange with nothing to do");
            return Ok(resp);
        }
        (false, true) => {
            info!("deleting resource");
            match ctx.run(rt.handler.delete(ctx, &req.prior_state)).await {
                Ok(()) => {
                    resp.new_state = Value::null(rt.state_type.clone());
                    resp.new_identity = None;
                    info!("ApplyResourceChange deleted resource");
                }
                Err(e) => {
                    error!(error = %e, "delete failed");
                    resp.diagnostics.push(e.to_diagnostic());
                }
            }
            return Ok(resp);
        }
        (true, false) => {
            info!("creating resource");
            ctx.run(rt.handler.create(ctx, &req.planned_state, &req.config)).await
        }
        (false, false) if req.prior_state == req.planned_state => {
            debug!("planned state equals prior state, skipping update");
            return Ok(resp);
        }
        (false, false) => {
            info!("updating resource");
            ctx.run(rt.handler.update(ctx, &req.prior_state, &req.planned_state, &req.config))
                .await
        }
    };

    match outcome {
        Ok(new_state) => {
            if !new_state.is_fully_known() {
                let summary = "Provider returned invalid result object after apply";
                resp.diagnostics.push(Diagnostic::error(summary).with_detail(format!(
                    "The new state for \"{}\" still contains unknown values. \
                     All values must be known after apply.",
                    rt.name
                )));
                return Ok(resp);
            }
            check_output(rt, &new_state, "new state")?;
            let new_state = scrub(rt, new_state);
            if let Some(identity) = derive_identity(rt, &new_state)? {
                resp.new_identity = Some(identity);
            }
            resp.new_state = new_state;
            info!("ApplyResourceChange completed");
        }
        Err(e) => {
            error!(error = %e, "ApplyResourceChange failed");
            resp.diagnostics.push(e.to_diagnostic());
        }
    }
    Ok(resp)
}

fn check_import_identity(schema: &IdentitySchema, identity: &Value) -> Vec<Diagnostic> {
    schema
        .attributes
        .iter()
        .filter(|(_, attr)| attr.required_for_import)
        .filter(|(name, _)| identity.get_attr(name).map_or(true, Value::is_null))
        .map(|(name, _)| {
            Diagnostic::error("Missing Required Identity Attribute")
                .with_detail(format!("Identity attribute \"{}\" is required for import", name))
                .with_attribute(name.clone())
        })
        .collect()
}

fn passthrough_import(rt: &ResourceType, target: &ImportTarget) -> Option<(Value, Option<Value>)> {
    let passthrough = rt.import_passthrough.as_ref()?;
    let identity_type = rt.identity_schema.as_ref().map(IdentitySchema::implied_type);

    let (id, identity) = match target {
        ImportTarget::Id(id) => {
            let identity = match (&passthrough.identity_attribute, &identity_type) {
                (Some(attr), Some(ty)) => {
                    Some(null_object(ty).with_attr(attr.clone(), Value::string(id.clone())))
                }
                _ => None,
            };
            (Value::string(id.clone()), identity)
        }
        ImportTarget::Identity(identity) => {
            let attr = passthrough.identity_attribute.as_ref()?;
            let id = identity.get_attr(attr)?.clone();
            (id, Some(identity.clone()))
        }
    };

    let mut state = null_object(&rt.state_type);
    if let Some(attr) = &passthrough.attribute {
        state = state.with_attr(attr.clone(), id);
    }
    Some((state, identity))
}

/// Import an existing remote object.
#[instrument(
    skip(rt, ctx, req),
    fields(type_name = %rt.name, id = %req.id),
    name = "core.import_resource_state"
)]
pub async fn import_resource_state(
    rt: &ResourceType,
    ctx: &SessionContext,
    req: ImportResourceStateRequest,
) -> Result<ImportResourceStateResponse, ProviderError> {
    let mut resp = ImportResourceStateResponse {
        imported_resources: Vec::new(),
        diagnostics: Vec::new(),
        deferred: None,
    };

    match check_deferral(ctx) {
        Deferral::Proceed => {}
        Deferral::Defer(deferred) => {
            info!("ImportResourceState deferred");
            resp.deferred = Some(deferred);
            return Ok(resp);
        }
        Deferral::Invalid(diagnostic) => {
            resp.diagnostics.push(diagnostic);
            return Ok(resp);
        }
    }

    let target = match (&req.identity, req.id.is_empty()) {
        (Some(identity), true) if !identity.is_null() => {
            let Some(identity_schema) = &rt.identity_schema else {
                resp.diagnostics.push(
                    Diagnostic::error("Unsupported Import by Identity").with_detail(format!(
                        "The resource \"{}\" does not define an identity schema",
                        rt.name
                    )),
                );
                return Ok(resp);
            };
            check_input(identity, &identity_schema.implied_type(), "identity")?;
            let problems = check_import_identity(identity_schema, identity);
            if !problems.is_empty() {
                resp.diagnostics = problems;
                return Ok(resp);
            }
            ImportTarget::Identity(identity.clone())
        }
        _ => ImportTarget::Id(req.id.clone()),
    };

    let (state, passthrough_identity) = match passthrough_import(rt, &target) {
        Some((state, identity)) => {
            debug!("import passed through without calling the handler");
            (state, identity)
        }
        None => match ctx.run(rt.handler.import(ctx, &target)).await {
            Ok(state) => (state, None),
            Err(e) => {
                error!(error = %e, "ImportResourceState failed");
                resp.diagnostics.push(e.to_diagnostic());
                return Ok(resp);
            }
        }
    };

    check_output(rt, &state, "imported state")?;
    let state = scrub(rt, state);
    let identity = match derive_identity(rt, &state)? {
        Some(identity) => Some(identity),
        None => match target {
            ImportTarget::Identity(identity) => Some(identity),
            ImportTarget::Id(_) => passthrough_identity,
        }
    };

    resp.imported_resources
        .push(ImportedResource::new(rt.name.clone(), state).with_identity(identity));
    info!(imported_count = resp.imported_resources.len(), "ImportResourceState completed");
    Ok(resp)
}

/// Move state from a foreign resource type into this one.
#[instrument(
    skip(rt, ctx, req),
    fields(type_name = %rt.name, source_type = %req.source_type_name),
    name = "core.move_resource_state"
)]
pub async fn move_resource_state(
    rt: &ResourceType,
    ctx: &SessionContext,
    req: MoveResourceStateRequest,
) -> Result<MoveResourceStateResponse, ProviderError> {
    let mut resp = MoveResourceStateResponse {
        target_state: None,
        diagnostics: Vec::new(),
        target_private: req.source_private.clone(),
        target_identity: None,
    };

    let Some(source) = rt
        .move_sources
        .iter()
        .find(|s| s.matches(&req.source_provider_address, &req.source_type_name))
    else {
        warn!(source_provider = %req.source_provider_address, "move source not allowed");
        resp.diagnostics.push(
            Diagnostic::error("Unsupported Resource Move").with_detail(format!(
                "The resource \"{}\" does not accept moves from \"{}\" of provider \"{}\".",
                rt.name, req.source_type_name, req.source_provider_address
            )),
        );
        return Ok(resp);
    };

    let source_state = match req.source_state {
        serde_json::Value::Object(map) => map,
        other => {
            resp.diagnostics.push(Diagnostic::error("Unable to Move Resource State").with_detail(
                format!("expected the source state to be a JSON object, got {}", other),
            ));
            return Ok(resp);
        }
    };

    let moved = match ctx
        .run(rt.handler.move_state(ctx, source, req.source_schema_version, source_state))
        .await
    {
        Ok(moved) => moved,
        Err(e) => {
            error!(error = %e, "MoveResourceState failed");
            resp.diagnostics.push(e.to_diagnostic());
            return Ok(resp);
        }
    };

    let moved = serde_json::Value::Object(moved);
    let state = match Value::from_json_permissive(&rt.state_type, &moved) {
        Ok(state) => scrub(rt, state),
        Err(err) => {
            resp.diagnostics.push(
                Diagnostic::error("Unable to Move Resource State").with_detail(err.to_string()),
            );
            return Ok(resp);
        }
    };

    let mut identity = derive_identity(rt, &state)?;
    if identity.is_none() {
        if let (Some(raw), Some(schema)) = (&req.source_identity, &rt.identity_schema) {
            match Value::from_json_permissive(&schema.implied_type(), raw) {
                Ok(moved_identity) => identity = Some(moved_identity),
                Err(err) => {
                    let summary = "Unable to Move Resource Identity";
                    resp.diagnostics.push(Diagnostic::error(summary).with_detail(err.to_string()))
                }
            }
        }
    }

    resp.target_state = Some(state);
    resp.target_identity = identity;
    info!("MoveResourceState completed");
    Ok(resp)
}

/// Upgrade a stored identity to the current identity schema version.
#[instrument(
    skip(rt, ctx, req),
    fields(type_name = %rt.name, version = req.version),
    name = "core.upgrade_resource_identity"
)]
pub async fn upgrade_resource_identity(
    rt: &ResourceType,
    ctx: &SessionContext,
    req: UpgradeResourceIdentityRequest,
) -> Result<UpgradeResourceIdentityResponse, ProviderError> {
    ctx.check_cancelled()?;
    let Some(identity_schema) = &rt.identity_schema else {
        return Ok(UpgradeResourceIdentityResponse {
            upgraded_identity: None,
            diagnostics: vec![Diagnostic::error("Unsupported Resource Identity").with_detail(
                format!("The resource \"{}\" does not define an identity schema", rt.name),
            )],
        });
    };

    match upgrade_json(
        "Resource Identity",
        &identity_schema.implied_type(),
        identity_schema.version,
        req.version,
        req.raw_identity,
        &rt.identity_upgraders,
    ) {
        Ok(identity) => {
            info!(
                from_version = req.version,
                to_version = identity_schema.version,
                "UpgradeResourceIdentity completed"
            );
            Ok(UpgradeResourceIdentityResponse {
                upgraded_identity: Some(identity),
                diagnostics: Vec::new(),
            })
        }
        Err(diagnostic) => {
            error!(summary = %diagnostic.summary, "UpgradeResourceIdentity failed");
            Ok(UpgradeResourceIdentityResponse {
                upgraded_identity: None,
                diagnostics: vec![diagnostic],
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refinement::Refinements;
    use crate::resource::{ImportPassthrough, MoveSource, Resource};
    use crate::schema::{
        Attribute, AttributeFlags, IdentityAttribute, NestedBlock, PlanModifier, Schema,
    };
    use crate::session::CancellationToken;
    use crate::types::ClientCapabilities;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Echoes planned state back and counts handler calls.
    #[derive(Default)]
    struct Echo {
        calls: AtomicUsize,
        leak: bool,
    }

    #[async_trait]
    impl Resource for Echo {
        fn schema(&self) -> Schema {
            Schema::v0()
                .with_attribute("name", Attribute::required_string().with_force_new())
                .with_attribute(
                    "id",
                    Attribute::computed_string()
                        .with_plan_modifier(PlanModifier::UseStateForUnknown)
                        .with_plan_modifier(PlanModifier::Refine(Refinements::new().not_null())),
                )
                .with_attribute(
                    "tag",
                    Attribute::new(Type::String, AttributeFlags::optional_computed())
                        .with_plan_modifier(PlanModifier::Refine(
                            Refinements::new().with_string_prefix("x-"),
                        )),
                )
                .with_attribute("secret", Attribute::optional_string().write_only())
        }

        fn identity_schema(&self) -> Option<IdentitySchema> {
            Some(
                IdentitySchema::new(0)
                    .with_attribute("name", IdentityAttribute::required(Type::String)),
            )
        }

        fn import_passthrough(&self) -> Option<ImportPassthrough> {
            Some(ImportPassthrough::attribute("name").with_identity_attribute("name"))
        }

        fn move_sources(&self) -> Vec<MoveSource> {
            vec![MoveSource::new("example.com/other/legacy", "legacy_echo")]
        }

        fn enforce_write_only(&self) -> bool {
            !self.leak
        }

        fn identity(&self, state: &Value) -> Option<Value> {
            state
                .get_attr("name")
                .map(|name| Value::object([("name", name.clone())]))
        }

        async fn create(
            &self,
            _: &SessionContext,
            planned: &Value,
            config: &Value,
        ) -> Result<Value, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let secret = config.get_attr("secret").cloned();
            Ok(planned
                .clone()
                .with_attr("id", Value::string("id-1"))
                .with_attr("tag", Value::string("x-tag"))
                .with_attr("secret", secret.unwrap_or(Value::null(Type::String))))
        }

        async fn read(
            &self,
            _: &SessionContext,
            current: &Value,
        ) -> Result<Option<Value>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if current.get_attr("name") == Some(&Value::string("gone")) {
                return Ok(None);
            }
            Ok(Some(current.clone()))
        }

        async fn update(
            &self,
            _: &SessionContext,
            _: &Value,
            planned: &Value,
            _: &Value,
        ) -> Result<Value, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(planned.clone().with_attr("tag", Value::string("x-updated")))
        }

        async fn delete(&self, _: &SessionContext, _: &Value) -> Result<(), ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn echo_type(handler: Echo) -> (ResourceType, Arc<Echo>) {
        let handler = Arc::new(handler);
        let rt = ResourceType::new("echo", handler.clone() as Arc<dyn Resource>).unwrap();
        (rt, handler)
    }

    fn ctx() -> SessionContext {
        SessionContext::new(CancellationToken::new())
    }

    fn state(name: &str, id: Value, tag: Value, secret: Value) -> Value {
        Value::object([
            ("name", Value::string(name)),
            ("id", id),
            ("tag", tag),
            ("secret", secret),
        ])
    }

    fn stored(name: &str) -> Value {
        let null = Value::null(Type::String);
        state(name, Value::string("id-1"), Value::string("x-tag"), null)
    }

    fn pending(name: &str) -> Value {
        let unknown = Value::unknown(Type::String);
        state(name, unknown.clone(), unknown, Value::null(Type::String))
    }

    fn deferring() -> SessionContext {
        ctx()
            .with_deferral_requested(true)
            .with_client_capabilities(ClientCapabilities {
                deferral_allowed: true,
                write_only_attributes_allowed: true,
            })
    }

    fn config(name: &str, secret: Option<&str>) -> Value {
        state(
            name,
            Value::null(Type::String),
            Value::null(Type::String),
            secret.map_or(Value::null(Type::String), Value::string),
        )
    }

    fn plan_req(rt: &ResourceType, prior: Value, config: Value) -> PlanResourceChangeRequest {
        PlanResourceChangeRequest {
            type_name: rt.name.clone(),
            prior_state: prior,
            proposed_new_state: config.clone(),
            config,
            prior_private: Vec::new(),
            provider_meta: None,
            client_capabilities: None,
            prior_identity: None,
        }
    }

    fn apply_req(prior: Value, planned: Value, config: Value) -> ApplyResourceChangeRequest {
        ApplyResourceChangeRequest {
            type_name: "echo".to_string(),
            prior_state: prior,
            planned_state: planned,
            config,
            planned_private: Vec::new(),
            provider_meta: None,
            planned_identity: None,
        }
    }

    #[tokio::test]
    async fn test_plan_create_marks_computed_unknown() {
        let (rt, _) = echo_type(Echo::default());
        let null = Value::null(rt.state_type.clone());
        let resp = plan_resource_change(&rt, &ctx(), plan_req(&rt, null, config("a", Some("pw"))))
            .await
            .unwrap();

        let planned = &resp.planned_state;
        let id = planned.get_attr("id").unwrap();
        assert!(id.is_unknown());
        assert!(id.refinements().unwrap().definitely_not_null);
        let tag = planned.get_attr("tag").unwrap();
        assert_eq!(tag.refinements().unwrap().string_prefix.as_deref(), Some("x-"));
        assert!(planned.get_attr("secret").unwrap().is_null());
        assert!(resp.requires_replace.is_empty());
        assert_eq!(
            resp.planned_identity,
            Some(Value::object([("name", Value::string("a"))]))
        );
    }

    #[tokio::test]
    async fn test_plan_keeps_arrived_refinements() {
        let (rt, _) = echo_type(Echo::default());
        let null = Value::null(rt.state_type.clone());
        let arrived = Refinements::new().not_null().with_string_prefix("x-abc");
        let unknown_tag = Value::unknown_refined(Type::String, arrived);
        let cfg = config("a", None).with_attr("tag", unknown_tag);
        let resp = plan_resource_change(&rt, &ctx(), plan_req(&rt, null, cfg)).await.unwrap();

        let tag = resp.planned_state.get_attr("tag").unwrap();
        let r = tag.refinements().unwrap();
        assert!(r.definitely_not_null);
        assert_eq!(r.string_prefix.as_deref(), Some("x-abc"));
    }

    #[tokio::test]
    async fn test_plan_update_uses_state_for_unknown_and_replace() {
        let (rt, _) = echo_type(Echo::default());
        let prior = stored("a");
        let proposed = stored("b");
        let mut req = plan_req(&rt, prior, config("b", None));
        req.proposed_new_state = proposed;
        let resp = plan_resource_change(&rt, &ctx(), req).await.unwrap();

        assert_eq!(resp.planned_state.get_attr("id"), Some(&Value::string("id-1")));
        assert!(resp.planned_state.get_attr("tag").unwrap().is_unknown());
        assert_eq!(resp.requires_replace, vec!["name".to_string()]);
    }

    #[tokio::test]
    async fn test_plan_no_change_keeps_prior() {
        let (rt, _) = echo_type(Echo::default());
        let prior = stored("a");
        let mut req = plan_req(&rt, prior.clone(), config("a", None));
        req.proposed_new_state = prior.clone();
        let resp = plan_resource_change(&rt, &ctx(), req).await.unwrap();
        assert_eq!(resp.planned_state, prior);
    }

    #[tokio::test]
    async fn test_plan_destroy() {
        let (rt, handler) = echo_type(Echo::default());
        let prior = stored("a");
        let null = Value::null(rt.state_type.clone());
        let mut req = plan_req(&rt, prior, null.clone());
        req.proposed_new_state = null;
        let resp = plan_resource_change(&rt, &ctx(), req).await.unwrap();
        assert!(resp.planned_state.is_null());
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_plan_deferral() {
        let (rt, _) = echo_type(Echo::default());
        let null = Value::null(rt.state_type.clone());
        let req = plan_req(&rt, null.clone(), config("a", None));
        let resp = plan_resource_change(&rt, &deferring(), req).await.unwrap();
        assert_eq!(resp.deferred, Some(Deferred::provider_config_unknown()));
        assert_eq!(resp.planned_state, config("a", None));

        let refused = ctx().with_deferral_requested(true);
        let resp = plan_resource_change(&rt, &refused, plan_req(&rt, null, config("a", None)))
            .await
            .unwrap();
        assert!(resp.deferred.is_none());
        assert_eq!(resp.diagnostics[0].summary, "Invalid Deferred Response");
    }

    #[tokio::test]
    async fn test_deferred_plan_nulls_write_only() {
        let (rt, _) = echo_type(Echo::default());
        let null = Value::null(rt.state_type.clone());
        let req = plan_req(&rt, null.clone(), config("a", Some("pw")));
        let resp = plan_resource_change(&rt, &deferring(), req).await.unwrap();
        assert!(resp.deferred.is_some());
        assert!(resp.planned_state.get_attr("secret").unwrap().is_null());

        let refused = ctx().with_deferral_requested(true);
        let resp = plan_resource_change(&rt, &refused, plan_req(&rt, null, config("a", Some("pw"))))
            .await
            .unwrap();
        assert_eq!(resp.diagnostics[0].summary, "Invalid Deferred Response");
        assert!(resp.planned_state.get_attr("secret").unwrap().is_null());
    }

    /// A resource whose only replacement trigger is a set.
    #[derive(Default)]
    struct Tagged {
        updates: AtomicUsize,
    }

    #[async_trait]
    impl Resource for Tagged {
        fn schema(&self) -> Schema {
            Schema::v0().with_attribute(
                "tags",
                Attribute::new(Type::set(Type::String), AttributeFlags::required())
                    .with_force_new(),
            )
        }

        async fn create(
            &self,
            _: &SessionContext,
            planned: &Value,
            _: &Value,
        ) -> Result<Value, ProviderError> {
            Ok(planned.clone())
        }

        async fn read(
            &self,
            _: &SessionContext,
            current: &Value,
        ) -> Result<Option<Value>, ProviderError> {
            Ok(Some(current.clone()))
        }

        async fn update(
            &self,
            _: &SessionContext,
            _: &Value,
            planned: &Value,
            _: &Value,
        ) -> Result<Value, ProviderError> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            Ok(planned.clone())
        }

        async fn delete(&self, _: &SessionContext, _: &Value) -> Result<(), ProviderError> {
            Ok(())
        }
    }

    fn tags(items: &[&str]) -> Value {
        let items = items.iter().map(|s| Value::string(*s)).collect();
        Value::object([("tags", Value::set(Type::String, items).unwrap())])
    }

    #[tokio::test]
    async fn test_reordered_set_is_not_a_change() {
        let handler = Arc::new(Tagged::default());
        let rt = ResourceType::new("tagged", handler.clone() as Arc<dyn Resource>).unwrap();

        let req = plan_req(&rt, tags(&["a", "b"]), tags(&["b", "a"]));
        let resp = plan_resource_change(&rt, &ctx(), req).await.unwrap();
        assert!(resp.requires_replace.is_empty());

        let req = plan_req(&rt, tags(&["a", "b"]), tags(&["a", "c"]));
        let resp = plan_resource_change(&rt, &ctx(), req).await.unwrap();
        assert_eq!(resp.requires_replace, vec!["tags".to_string()]);

        let mut req = apply_req(tags(&["a", "b"]), tags(&["b", "a"]), tags(&["b", "a"]));
        req.type_name = "tagged".to_string();
        let resp = apply_resource_change(&rt, &ctx(), req).await.unwrap();
        assert_eq!(resp.new_state, tags(&["a", "b"]));
        assert_eq!(handler.updates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_plan_rejects_mistyped_input() {
        let (rt, _) = echo_type(Echo::default());
        let bad = Value::object([("name", Value::number(1.0))]);
        let req = plan_req(&rt, Value::null(rt.state_type.clone()), bad);
        let err = plan_resource_change(&rt, &ctx(), req).await.unwrap_err();
        assert!(matches!(err, ProviderError::ValueDecode(_)));
    }

    #[tokio::test]
    async fn test_apply_create_nulls_write_only() {
        let (rt, _) = echo_type(Echo::default());
        let null = Value::null(rt.state_type.clone());
        let planned = pending("a");
        let req = apply_req(null, planned, config("a", Some("pw")));
        let resp = apply_resource_change(&rt, &ctx(), req).await.unwrap();
        assert!(resp.diagnostics.is_empty());
        assert_eq!(resp.new_state.get_attr("id"), Some(&Value::string("id-1")));
        assert!(resp.new_state.get_attr("secret").unwrap().is_null());
        assert!(resp.new_identity.is_some());
    }

    #[tokio::test]
    async fn test_apply_leak_switch_keeps_write_only() {
        let (rt, _) = echo_type(Echo {
            leak: true,
            ..Default::default()
        });
        let null = Value::null(rt.state_type.clone());
        let planned = pending("a");
        let req = apply_req(null, planned, config("a", Some("pw")));
        let resp = apply_resource_change(&rt, &ctx(), req).await.unwrap();
        assert_eq!(resp.new_state.get_attr("secret"), Some(&Value::string("pw")));
    }

    #[tokio::test]
    async fn test_apply_same_state_is_noop() {
        let (rt, handler) = echo_type(Echo::default());
        let prior = stored("a");
        let req = apply_req(prior.clone(), prior.clone(), config("a", None));
        let resp = apply_resource_change(&rt, &ctx(), req).await.unwrap();
        assert_eq!(resp.new_state, prior);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_apply_destroy_and_null_noop() {
        let (rt, handler) = echo_type(Echo::default());
        let prior = stored("a");
        let null = Value::null(rt.state_type.clone());
        let resp = apply_resource_change(&rt, &ctx(), apply_req(prior, null.clone(), null.clone()))
            .await
            .unwrap();
        assert!(resp.new_state.is_null());
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);

        let resp = apply_resource_change(&rt, &ctx(), apply_req(null.clone(), null.clone(), null))
            .await
            .unwrap();
        assert!(resp.new_state.is_null());
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_read_missing_returns_null() {
        let (rt, _) = echo_type(Echo::default());
        let current = stored("gone");
        let resp = read_resource(
            &rt,
            &ctx(),
            ReadResourceRequest {
                type_name: "echo".to_string(),
                current_state: current,
                private: Vec::new(),
                provider_meta: None,
                client_capabilities: None,
                current_identity: None,
            },
        )
        .await
        .unwrap();
        assert!(resp.new_state.is_null());
        assert!(resp.new_identity.is_none());
    }

    #[tokio::test]
    async fn test_read_identity_change_is_error() {
        let (rt, _) = echo_type(Echo::default());
        let current = stored("a");
        let resp = read_resource(
            &rt,
            &ctx(),
            ReadResourceRequest {
                type_name: "echo".to_string(),
                current_state: current,
                private: Vec::new(),
                provider_meta: None,
                client_capabilities: None,
                current_identity: Some(Value::object([("name", Value::string("b"))])),
            },
        )
        .await
        .unwrap();
        assert_eq!(resp.diagnostics[0].summary, "Unexpected Identity Change");
    }

    #[tokio::test]
    async fn test_upgrade_same_version_is_permissive() {
        let (rt, _) = echo_type(Echo::default());
        let resp = upgrade_resource_state(
            &rt,
            &ctx(),
            UpgradeResourceStateRequest {
                type_name: "echo".to_string(),
                version: 0,
                raw_state: serde_json::json!({
                    "name": "a",
                    "id": "id-1",
                    "dropped": true,
                    "secret": "leaked"
                }),
            },
        )
        .await
        .unwrap();
        let upgraded = resp.upgraded_state.unwrap();
        assert_eq!(upgraded.get_attr("name"), Some(&Value::string("a")));
        assert!(upgraded.get_attr("dropped").is_none());
        assert!(upgraded.get_attr("secret").unwrap().is_null());
        assert_eq!(resp.diagnostics.len(), 1);
        assert_eq!(resp.diagnostics[0].summary, "Write-only Attribute Removed From State");
    }

    #[tokio::test]
    async fn test_upgrade_newer_version_errors() {
        let (rt, _) = echo_type(Echo::default());
        let resp = upgrade_resource_state(
            &rt,
            &ctx(),
            UpgradeResourceStateRequest {
                type_name: "echo".to_string(),
                version: 3,
                raw_state: serde_json::json!({"name": "a"}),
            },
        )
        .await
        .unwrap();
        assert!(resp.upgraded_state.is_none());
        assert_eq!(resp.diagnostics[0].summary, "Unable to Upgrade Resource State");
    }

    #[tokio::test]
    async fn test_import_passthrough_by_id_and_identity() {
        let (rt, handler) = echo_type(Echo::default());
        let resp = import_resource_state(
            &rt,
            &ctx(),
            ImportResourceStateRequest {
                type_name: "echo".to_string(),
                id: "imported".to_string(),
                identity: None,
                client_capabilities: None,
            },
        )
        .await
        .unwrap();
        let imported = &resp.imported_resources[0];
        assert_eq!(imported.state.get_attr("name"), Some(&Value::string("imported")));
        assert!(imported.state.get_attr("id").unwrap().is_null());
        assert_eq!(
            imported.identity,
            Some(Value::object([("name", Value::string("imported"))]))
        );

        let resp = import_resource_state(
            &rt,
            &ctx(),
            ImportResourceStateRequest {
                type_name: "echo".to_string(),
                id: String::new(),
                identity: Some(Value::object([("name", Value::string("by-identity"))])),
                client_capabilities: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(
            resp.imported_resources[0].state.get_attr("name"),
            Some(&Value::string("by-identity"))
        );
        assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_import_identity_missing_required() {
        let (rt, _) = echo_type(Echo::default());
        let resp = import_resource_state(
            &rt,
            &ctx(),
            ImportResourceStateRequest {
                type_name: "echo".to_string(),
                id: String::new(),
                identity: Some(Value::object([("name", Value::null(Type::String))])),
                client_capabilities: None,
            },
        )
        .await
        .unwrap();
        assert!(resp.imported_resources.is_empty());
        assert_eq!(resp.diagnostics[0].summary, "Missing Required Identity Attribute");
    }

    #[tokio::test]
    async fn test_move_whitelist() {
        let (rt, _) = echo_type(Echo::default());
        let req = |provider: &str, ty: &str| MoveResourceStateRequest {
            source_provider_address: provider.to_string(),
            source_type_name: ty.to_string(),
            source_schema_version: 0,
            source_state: serde_json::json!({"name": "moved", "extra": 1, "secret": "s"}),
            target_type_name: "echo".to_string(),
            source_private: Vec::new(),
            source_identity: None,
            source_identity_schema_version: 0,
        };

        let resp = move_resource_state(&rt, &ctx(), req("example.com/other/legacy", "legacy_echo"))
            .await
            .unwrap();
        let state = resp.target_state.unwrap();
        assert_eq!(state.get_attr("name"), Some(&Value::string("moved")));
        assert!(state.get_attr("secret").unwrap().is_null());
        assert_eq!(
            resp.target_identity,
            Some(Value::object([("name", Value::string("moved"))]))
        );

        let resp = move_resource_state(&rt, &ctx(), req("example.com/other/legacy", "other"))
            .await
            .unwrap();
        assert!(resp.target_state.is_none());
        assert_eq!(resp.diagnostics[0].summary, "Unsupported Resource Move");
    }

    #[tokio::test]
    async fn test_validate_write_only_not_allowed() {
        let (rt, _) = echo_type(Echo::default());
        let diagnostics = validate_resource_config(
            &rt,
            &ctx(),
            ValidateResourceConfigRequest {
                type_name: "echo".to_string(),
                config: config("a", Some("pw")),
                client_capabilities: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Write-only Attribute Not Allowed");
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("secret"));

        let allowed = ctx().with_client_capabilities(ClientCapabilities {
            deferral_allowed: false,
            write_only_attributes_allowed: true,
        });
        let diagnostics = validate_resource_config(
            &rt,
            &allowed,
            ValidateResourceConfigRequest {
                type_name: "echo".to_string(),
                config: config("a", Some("pw")),
                client_capabilities: None,
            },
        )
        .await
        .unwrap();
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_null_write_only_nested() {
        let inner = Block::new()
            .with_attribute("token", Attribute::optional_string().write_only())
            .with_attribute("label", Attribute::optional_string());
        let schema = Schema::v0().with_block("auth", NestedBlock::list(inner.clone()));
        let item = Value::object([("token", Value::string("t")), ("label", Value::string("l"))]);
        let auth = Value::list(inner.implied_type(), vec![item]).unwrap();
        let value = Value::object([("auth", auth)]);

        let (value, nulled) = null_write_only(&schema.block, value);
        assert_eq!(nulled, vec!["auth.0.token".to_string()]);
        let items = value.get_attr("auth").unwrap().as_elements().unwrap();
        assert!(items[0].get_attr("token").unwrap().is_null());
        assert_eq!(items[0].get_attr("label"), Some(&Value::string("l")));
    }
}
