//! Testing utilities for the Warden workspace
//!
//! Shared fixtures: in-memory stores, a recording transport, a scripted
//! dispatcher and a handful of command/context builders.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use warden_core::{
    AffordanceId, AffordanceSpec, ArgValue, BoundArgs, CommandFailure, CommandRegistry,
    CommandSpec, ConverterKind, Dispatcher, GuildChannel, Incident, IncidentFeed, IncidentId,
    IncidentStore, InvocationContext, NewIncident, ParameterSpec, PresentedMessage, PromptSpec,
    Restriction, RestrictionScope, RestrictionStore, Snowflake, StoreError, Transport,
    TransportError,
};

/// In-memory restriction store with a switch to simulate backend failure.
#[derive(Debug, Default)]
pub struct MemoryRestrictionStore {
    rows: Mutex<BTreeMap<u64, Restriction>>,
    fail_writes: AtomicBool,
}

impl MemoryRestrictionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with a backend error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn row(&self, snowflake: Snowflake) -> Option<Restriction> {
        self.rows.lock().unwrap().get(&snowflake.0).cloned()
    }

    pub fn seed(&self, restriction: Restriction) {
        self.rows
            .lock()
            .unwrap()
            .insert(restriction.snowflake.0, restriction);
    }

    fn write_guard(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("simulated outage".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RestrictionStore for MemoryRestrictionStore {
    async fn load_all(&self) -> Result<Vec<Restriction>, StoreError> {
        Ok(self.rows.lock().unwrap().values().cloned().collect())
    }

    async fn insert(&self, restriction: &Restriction) -> Result<(), StoreError> {
        self.write_guard()?;
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&restriction.snowflake.0) {
            return Err(StoreError::Conflict);
        }
        rows.insert(restriction.snowflake.0, restriction.clone());
        Ok(())
    }

    async fn delete(&self, snowflake: Snowflake) -> Result<(), StoreError> {
        self.write_guard()?;
        self.rows.lock().unwrap().remove(&snowflake.0);
        Ok(())
    }
}

/// In-memory incident store.
#[derive(Debug, Default)]
pub struct MemoryIncidentStore {
    rows: Mutex<Vec<Incident>>,
    watches: Mutex<Vec<(IncidentId, Snowflake)>>,
    next_id: AtomicI64,
}

impl MemoryIncidentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn watch_count(&self, id: IncidentId) -> usize {
        self.watches
            .lock()
            .unwrap()
            .iter()
            .filter(|(watched, _)| *watched == id)
            .count()
    }
}

#[async_trait]
impl IncidentStore for MemoryIncidentStore {
    async fn find_open(
        &self,
        command: &str,
        signature: &str,
    ) -> Result<Option<Incident>, StoreError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.command == command && i.signature == signature && !i.fixed)
            .cloned())
    }

    async fn insert(&self, incident: NewIncident) -> Result<Incident, StoreError> {
        let id = IncidentId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let incident = incident.into_incident(id);
        self.rows.lock().unwrap().push(incident.clone());
        Ok(incident)
    }

    async fn get(&self, id: IncidentId) -> Result<Option<Incident>, StoreError> {
        Ok(self.rows.lock().unwrap().iter().find(|i| i.id == id).cloned())
    }

    async fn all(&self) -> Result<Vec<Incident>, StoreError> {
        let mut rows = self.rows.lock().unwrap().clone();
        rows.sort_by_key(|i| i.id);
        Ok(rows)
    }

    async fn set_fixed(&self, id: IncidentId) -> Result<(), StoreError> {
        for row in self.rows.lock().unwrap().iter_mut() {
            if row.id == id {
                row.fixed = true;
            }
        }
        Ok(())
    }

    async fn add_watch(&self, id: IncidentId, user: Snowflake) -> Result<(), StoreError> {
        self.watches.lock().unwrap().push((id, user));
        Ok(())
    }

    async fn remove_watch(&self, id: IncidentId, user: Snowflake) -> Result<(), StoreError> {
        self.watches
            .lock()
            .unwrap()
            .retain(|(watched, watcher)| !(*watched == id && *watcher == user));
        Ok(())
    }

    async fn has_watch(&self, id: IncidentId, user: Snowflake) -> Result<bool, StoreError> {
        Ok(self
            .watches
            .lock()
            .unwrap()
            .iter()
            .any(|(watched, watcher)| *watched == id && *watcher == user))
    }

    async fn watchers(&self, id: IncidentId) -> Result<Vec<Snowflake>, StoreError> {
        Ok(self
            .watches
            .lock()
            .unwrap()
            .iter()
            .filter(|(watched, _)| *watched == id)
            .map(|(_, watcher)| *watcher)
            .collect())
    }

    async fn clear_watches(&self, id: IncidentId) -> Result<(), StoreError> {
        self.watches
            .lock()
            .unwrap()
            .retain(|(watched, _)| *watched != id);
        Ok(())
    }
}

/// A transport that records everything and renders nothing.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    pub sent: Mutex<Vec<(Snowflake, String)>>,
    pub replies: Mutex<Vec<(Snowflake, String, Option<Duration>)>>,
    pub edits: Mutex<Vec<(Snowflake, String)>>,
    pub deleted: Mutex<Vec<Snowflake>>,
    pub dms: Mutex<Vec<(Snowflake, String)>>,
    pub presented: Mutex<Vec<(PresentedMessage, String, AffordanceSpec)>>,
    pub updates: Mutex<Vec<(PresentedMessage, AffordanceSpec)>>,
    pub prompts: Mutex<Vec<(AffordanceId, PromptSpec)>>,
    pub private_responses: Mutex<Vec<(AffordanceId, Snowflake, String)>>,
    channels: DashMap<u64, Vec<GuildChannel>>,
    unreachable: DashMap<u64, ()>,
    next_message: AtomicU64,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            next_message: AtomicU64::new(9000),
            ..Self::default()
        }
    }

    /// Script the channel list returned for a guild.
    pub fn set_guild_channels(&self, guild: Snowflake, channels: Vec<GuildChannel>) {
        self.channels.insert(guild.0, channels);
    }

    /// Make direct messages to a user fail.
    pub fn set_unreachable(&self, user: Snowflake) {
        self.unreachable.insert(user.0, ());
    }

    pub fn dm_count(&self) -> usize {
        self.dms.lock().unwrap().len()
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn reply_count(&self) -> usize {
        self.replies.lock().unwrap().len()
    }

    pub fn last_reply(&self) -> Option<(Snowflake, String, Option<Duration>)> {
        self.replies.lock().unwrap().last().cloned()
    }

    pub fn last_presented(&self) -> Option<(PresentedMessage, String, AffordanceSpec)> {
        self.presented.lock().unwrap().last().cloned()
    }

    pub fn last_update(&self) -> Option<(PresentedMessage, AffordanceSpec)> {
        self.updates.lock().unwrap().last().cloned()
    }

    pub fn last_prompt(&self) -> Option<(AffordanceId, PromptSpec)> {
        self.prompts.lock().unwrap().last().cloned()
    }

    pub fn last_private_response(&self) -> Option<(AffordanceId, Snowflake, String)> {
        self.private_responses.lock().unwrap().last().cloned()
    }

    fn next_message_id(&self) -> Snowflake {
        Snowflake(self.next_message.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn send(&self, channel: Snowflake, content: &str) -> Result<Snowflake, TransportError> {
        self.sent.lock().unwrap().push((channel, content.to_string()));
        Ok(self.next_message_id())
    }

    async fn reply(
        &self,
        channel: Snowflake,
        _to: Snowflake,
        content: &str,
        delete_after: Option<Duration>,
    ) -> Result<Snowflake, TransportError> {
        self.replies
            .lock()
            .unwrap()
            .push((channel, content.to_string(), delete_after));
        Ok(self.next_message_id())
    }

    async fn edit(
        &self,
        _channel: Snowflake,
        message: Snowflake,
        content: &str,
    ) -> Result<(), TransportError> {
        self.edits.lock().unwrap().push((message, content.to_string()));
        Ok(())
    }

    async fn delete(&self, _channel: Snowflake, message: Snowflake) -> Result<(), TransportError> {
        self.deleted.lock().unwrap().push(message);
        Ok(())
    }

    async fn direct_message(&self, user: Snowflake, content: &str) -> Result<(), TransportError> {
        if self.unreachable.contains_key(&user.0) {
            return Err(TransportError::Forbidden);
        }
        self.dms.lock().unwrap().push((user, content.to_string()));
        Ok(())
    }

    async fn guild_channels(
        &self,
        guild: Snowflake,
    ) -> Result<Vec<GuildChannel>, TransportError> {
        Ok(self
            .channels
            .get(&guild.0)
            .map(|c| c.clone())
            .unwrap_or_default())
    }

    async fn present(
        &self,
        channel: Snowflake,
        _reply_to: Option<Snowflake>,
        content: &str,
        affordance: AffordanceSpec,
    ) -> Result<PresentedMessage, TransportError> {
        let presented = PresentedMessage {
            channel,
            message: self.next_message_id(),
            affordance: affordance.id,
        };
        self.presented
            .lock()
            .unwrap()
            .push((presented, content.to_string(), affordance));
        Ok(presented)
    }

    async fn update(
        &self,
        presented: &PresentedMessage,
        affordance: AffordanceSpec,
    ) -> Result<(), TransportError> {
        self.updates.lock().unwrap().push((*presented, affordance));
        Ok(())
    }

    async fn open_prompt(
        &self,
        affordance: AffordanceId,
        prompt: PromptSpec,
    ) -> Result<(), TransportError> {
        self.prompts.lock().unwrap().push((affordance, prompt));
        Ok(())
    }

    async fn respond_private(
        &self,
        affordance: AffordanceId,
        user: Snowflake,
        content: &str,
    ) -> Result<(), TransportError> {
        self.private_responses
            .lock()
            .unwrap()
            .push((affordance, user, content.to_string()));
        Ok(())
    }
}

/// Incident feed that records published summaries.
#[derive(Debug, Default)]
pub struct RecordingFeed {
    pub published: Mutex<Vec<Incident>>,
}

impl RecordingFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl IncidentFeed for RecordingFeed {
    async fn publish(&self, incident: &Incident) -> Result<(), TransportError> {
        self.published.lock().unwrap().push(incident.clone());
        Ok(())
    }
}

type FailureFactory = Box<dyn Fn() -> CommandFailure + Send + Sync>;

/// Dispatcher whose outcomes are scripted per command.
///
/// `invoke` runs the scripted check first, mirroring the host framework's
/// full check pipeline on every (re-)invocation.
#[derive(Default)]
pub struct ScriptedDispatcher {
    invocations: Mutex<Vec<(String, BoundArgs)>>,
    check_failures: DashMap<String, FailureFactory>,
    invoke_failures: DashMap<String, FailureFactory>,
}

impl ScriptedDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the command's checks fail with the produced failure.
    pub fn fail_checks_with(
        &self,
        command: &str,
        factory: impl Fn() -> CommandFailure + Send + Sync + 'static,
    ) {
        self.check_failures
            .insert(command.to_string(), Box::new(factory));
    }

    /// Make the command's body fail with the produced failure.
    pub fn fail_invoke_with(
        &self,
        command: &str,
        factory: impl Fn() -> CommandFailure + Send + Sync + 'static,
    ) {
        self.invoke_failures
            .insert(command.to_string(), Box::new(factory));
    }

    /// Stop failing the command's body.
    pub fn clear_invoke_failure(&self, command: &str) {
        self.invoke_failures.remove(command);
    }

    pub fn invocations(&self) -> Vec<(String, BoundArgs)> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }
}

#[async_trait]
impl Dispatcher for ScriptedDispatcher {
    async fn invoke(
        &self,
        ctx: &InvocationContext,
        command: &str,
        args: &BoundArgs,
    ) -> Result<(), CommandFailure> {
        self.can_run(ctx, command).await?;
        if let Some(factory) = self.invoke_failures.get(command) {
            return Err((factory.value())());
        }
        self.invocations
            .lock()
            .unwrap()
            .push((command.to_string(), args.clone()));
        Ok(())
    }

    async fn can_run(
        &self,
        _ctx: &InvocationContext,
        command: &str,
    ) -> Result<(), CommandFailure> {
        if let Some(factory) = self.check_failures.get(command) {
            return Err((factory.value())());
        }
        Ok(())
    }
}

impl std::fmt::Debug for ScriptedDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedDispatcher")
            .field("invocations", &self.invocation_count())
            .finish_non_exhaustive()
    }
}

/// A restriction expiring `seconds` from now (negative for already expired).
pub fn restriction_expiring_in(
    snowflake: Snowflake,
    scope: RestrictionScope,
    seconds: i64,
) -> Restriction {
    Restriction {
        snowflake,
        reason: "test restriction".to_string(),
        expires_at: Some(Utc::now() + ChronoDuration::seconds(seconds)),
        scope,
    }
}

/// A permanent restriction.
pub fn permanent_restriction(snowflake: Snowflake, scope: RestrictionScope) -> Restriction {
    Restriction {
        snowflake,
        reason: "test restriction".to_string(),
        expires_at: None,
        scope,
    }
}

/// `greet <target> [repeat=5]`, the canonical backfill fixture.
pub fn greet_command() -> CommandSpec {
    CommandSpec::new("greet", "Greet someone")
        .with_parameter(ParameterSpec::required(
            "target",
            "Who to greet",
            ConverterKind::Text,
        ))
        .with_parameter(ParameterSpec::optional(
            "repeat",
            "How many times",
            ConverterKind::Integer,
            Some(ArgValue::Int(5)),
        ))
}

/// A registry with a few commands to suggest against.
pub fn sample_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    registry.insert(greet_command());
    registry.insert(CommandSpec::new("ping", "Measure latency"));
    registry.insert(CommandSpec::new("purge", "Bulk-delete messages"));
    registry.insert(CommandSpec::new("help", "Show help"));
    registry
}

/// A guild invocation context for `user` in `guild`.
pub fn guild_ctx(user: u64, guild: u64) -> InvocationContext {
    InvocationContext::in_guild(
        Snowflake(user),
        Snowflake(guild),
        Snowflake(500),
        Snowflake(600),
    )
    .with_origin_url("https://chat.example/500/600")
}

/// A direct-channel invocation context for `user`.
pub fn direct_ctx(user: u64) -> InvocationContext {
    InvocationContext::direct(Snowflake(user), Snowflake(501), Snowflake(601))
        .with_origin_url("https://chat.example/501/601")
}
