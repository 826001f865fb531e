//! The access gate: restriction cache, lifecycle and denial disclosure.
//!
//! Every command invocation passes through [`AccessGate::check`] before its
//! body runs. The cache is the single source of truth at request time; it is
//! loaded in full at startup and kept in lockstep with the store on every
//! mutation (store write first, cache second, so an interrupted sequence can
//! be retried safely).

use crate::error::GateError;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use warden_core::{
    ChannelKind, CommandFailure, InvocationContext, Restriction, RestrictionScope,
    RestrictionStore, Snowflake, Transport,
};

/// Gate configuration, constructed once at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Gate trips in shared channels before the notice is delivered via DM
    pub disclosure_threshold: u32,
    /// Snowflakes that can never be restricted
    pub protected: Vec<Snowflake>,
    /// Appeal instructions appended to every user notice
    pub appeal_note: String,
    /// Support invite appended to community notices
    pub support_invite: Option<String>,
}

impl GateConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With a disclosure threshold
    #[inline]
    #[must_use]
    pub fn with_disclosure_threshold(mut self, threshold: u32) -> Self {
        self.disclosure_threshold = threshold;
        self
    }

    /// With protected snowflakes
    #[inline]
    #[must_use]
    pub fn with_protected(mut self, protected: Vec<Snowflake>) -> Self {
        self.protected = protected;
        self
    }

    /// With a support invite
    #[inline]
    #[must_use]
    pub fn with_support_invite(mut self, invite: &str) -> Self {
        self.support_invite = Some(invite.to_string());
        self
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            disclosure_threshold: 10,
            protected: Vec::new(),
            appeal_note: "If you wish to appeal, please DM one of the bot owners.".to_string(),
            support_invite: None,
        }
    }
}

/// Access gate service.
///
/// Owns the process-wide restriction cache and the volatile per-user attempt
/// counters. Both are mutated only from the scheduler's single logical
/// thread; the concurrent map keeps interrupted mutation sequences safe to
/// retry.
pub struct AccessGate {
    store: Arc<dyn RestrictionStore>,
    transport: Arc<dyn Transport>,
    config: GateConfig,
    cache: DashMap<Snowflake, Restriction>,
    attempts: DashMap<Snowflake, u32>,
}

impl AccessGate {
    /// Create a gate over a store and transport. Call [`AccessGate::load`]
    /// before serving checks.
    #[must_use]
    pub fn new(
        store: Arc<dyn RestrictionStore>,
        transport: Arc<dyn Transport>,
        config: GateConfig,
    ) -> Self {
        Self {
            store,
            transport,
            config,
            cache: DashMap::new(),
            attempts: DashMap::new(),
        }
    }

    /// Populate the cache in full from the persistent store.
    ///
    /// # Errors
    /// Propagates store failures; the cache is left empty and the gate must
    /// not serve checks until a retry succeeds.
    pub async fn load(&self) -> Result<usize, GateError> {
        let entries = self.store.load_all().await?;
        let count = entries.len();
        for restriction in entries {
            self.cache.insert(restriction.snowflake, restriction);
        }
        tracing::info!("restriction cache loaded with {count} entries");
        Ok(count)
    }

    /// Gate check run before every command.
    ///
    /// User restriction first, then community. A denial runs the matching
    /// disclosure handler and surfaces as the [`CommandFailure::AccessDenied`]
    /// sentinel, which downstream routing never re-reports.
    ///
    /// # Errors
    /// `CommandFailure::AccessDenied` when the issuer or community is
    /// restricted.
    pub async fn check(&self, ctx: &InvocationContext) -> Result<(), CommandFailure> {
        if let Some(restriction) = self.active_restriction(ctx.user).await {
            self.handle_user_denial(ctx, &restriction).await;
            return Err(CommandFailure::AccessDenied);
        }

        if let Some(guild) = ctx.guild {
            if let Some(restriction) = self.active_restriction(guild).await {
                self.handle_guild_denial(Some(ctx), guild, &restriction).await;
                return Err(CommandFailure::AccessDenied);
            }
        }

        Ok(())
    }

    /// Whether a snowflake is currently restricted. Read-only: expired
    /// entries report as unrestricted but are left for lazy removal.
    #[must_use]
    pub fn is_restricted(&self, snowflake: Snowflake) -> bool {
        self.cache
            .get(&snowflake)
            .is_some_and(|r| !r.is_expired(Utc::now()))
    }

    /// The active restriction for a snowflake, if any.
    #[must_use]
    pub fn lookup(&self, snowflake: Snowflake) -> Option<Restriction> {
        self.cache
            .get(&snowflake)
            .filter(|r| !r.is_expired(Utc::now()))
            .map(|r| r.clone())
    }

    /// Active restriction counts as `(users, communities)`.
    #[must_use]
    pub fn counts(&self) -> (usize, usize) {
        let now = Utc::now();
        let mut users = 0;
        let mut communities = 0;
        for entry in self.cache.iter() {
            if entry.is_expired(now) {
                continue;
            }
            match entry.scope {
                RestrictionScope::User => users += 1,
                RestrictionScope::Community => communities += 1,
            }
        }
        (users, communities)
    }

    /// Add a restriction: persistent write first, then cache.
    ///
    /// # Errors
    /// - `GateError::Protected` for snowflakes on the protected list
    /// - `GateError::AlreadyRestricted` when an active restriction exists
    /// - `GateError::Store` on a failed write; neither store nor cache change
    pub async fn add(
        &self,
        snowflake: Snowflake,
        scope: RestrictionScope,
        reason: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<Restriction, GateError> {
        if self.config.protected.contains(&snowflake) {
            return Err(GateError::Protected { snowflake });
        }

        // An expired leftover is cleared here rather than blocking the add.
        if let Some(existing) = self.active_restriction(snowflake).await {
            return Err(GateError::AlreadyRestricted { existing });
        }

        let restriction = Restriction {
            snowflake,
            reason: reason.to_string(),
            expires_at,
            scope,
        };
        self.store.insert(&restriction).await?;
        self.cache.insert(snowflake, restriction.clone());
        tracing::info!("restricted {snowflake} ({})", restriction.until_phrase());
        Ok(restriction)
    }

    /// Remove a restriction: persistent delete first, then cache.
    ///
    /// # Errors
    /// - `GateError::NotRestricted` when no active restriction exists
    /// - `GateError::Store` on a failed delete; the cache entry stays
    pub async fn remove(&self, snowflake: Snowflake) -> Result<Restriction, GateError> {
        if !self.cache.contains_key(&snowflake) {
            return Err(GateError::NotRestricted { snowflake });
        }

        self.store.delete(snowflake).await?;
        match self.cache.remove(&snowflake) {
            Some((_, restriction)) => {
                tracing::info!("lifted restriction on {snowflake}");
                Ok(restriction)
            }
            None => Err(GateError::NotRestricted { snowflake }),
        }
    }

    /// Announce a community's restriction without an invocation context,
    /// e.g. when the bot is added to a restricted community. Resolves the
    /// notice channel via the system channel, then any sendable channel
    /// named like "general".
    pub async fn announce_restriction(&self, guild: Snowflake) {
        if let Some(restriction) = self.lookup(guild) {
            self.handle_guild_denial(None, guild, &restriction).await;
        }
    }

    /// Attempt count accumulated for a restricted user since the last
    /// disclosure (or process start).
    #[must_use]
    pub fn attempt_count(&self, user: Snowflake) -> u32 {
        self.attempts.get(&user).map_or(0, |n| *n)
    }

    /// Look up a live restriction, removing it lazily when expired.
    ///
    /// The cache entry is claimed atomically before the store delete, so
    /// concurrent re-checks remove each expired restriction exactly once.
    async fn active_restriction(&self, snowflake: Snowflake) -> Option<Restriction> {
        let current = self.cache.get(&snowflake).map(|r| r.clone())?;
        if !current.is_expired(Utc::now()) {
            return Some(current);
        }

        if self
            .cache
            .remove_if(&snowflake, |_, r| r.is_expired(Utc::now()))
            .is_some()
        {
            if let Err(err) = self.store.delete(snowflake).await {
                // The row stays behind but reads as expired; the next
                // mutation or restart retries the delete.
                tracing::warn!("failed to delete expired restriction {snowflake}: {err}");
            } else {
                tracing::debug!("expired restriction on {snowflake} removed");
            }
        }
        None
    }

    /// Disclosure for a denied user.
    ///
    /// Direct channels always get the notice. Shared channels stay silent
    /// until the attempt counter reaches the threshold, at which point the
    /// notice goes out as a DM and the counter resets.
    async fn handle_user_denial(&self, ctx: &InvocationContext, restriction: &Restriction) {
        let notice = self.user_notice(restriction);

        if ctx.channel_kind == ChannelKind::Direct {
            if let Err(err) = self.transport.send(ctx.channel, &notice).await {
                tracing::warn!("could not deliver restriction notice: {err}");
            }
            return;
        }

        let trips = {
            let mut entry = self.attempts.entry(ctx.user).or_insert(0);
            *entry += 1;
            *entry
        };

        if trips >= self.config.disclosure_threshold {
            self.attempts.remove(&ctx.user);
            if let Err(err) = self.transport.direct_message(ctx.user, &notice).await {
                tracing::warn!("could not DM restriction notice to {}: {err}", ctx.user);
            }
        }
    }

    /// Disclosure for a denied community: the context channel when the trip
    /// happened inside one, otherwise a resolved notice channel.
    async fn handle_guild_denial(
        &self,
        ctx: Option<&InvocationContext>,
        guild: Snowflake,
        restriction: &Restriction,
    ) {
        let channel = match ctx {
            Some(ctx) if ctx.channel_kind == ChannelKind::Guild => Some(ctx.channel),
            _ => self.resolve_notice_channel(guild).await,
        };

        let Some(channel) = channel else {
            tracing::debug!("no notice channel for restricted community {guild}");
            return;
        };

        let notice = self.guild_notice(restriction);
        if let Err(err) = self.transport.send(channel, &notice).await {
            tracing::warn!("could not deliver community restriction notice: {err}");
        }
    }

    /// System channel first, then any sendable channel named like "general".
    async fn resolve_notice_channel(&self, guild: Snowflake) -> Option<Snowflake> {
        let channels = match self.transport.guild_channels(guild).await {
            Ok(channels) => channels,
            Err(err) => {
                tracing::warn!("could not list channels for {guild}: {err}");
                return None;
            }
        };

        channels
            .iter()
            .find(|c| c.is_system && c.can_send)
            .or_else(|| {
                channels
                    .iter()
                    .find(|c| c.name.to_lowercase().contains("general") && c.can_send)
            })
            .map(|c| c.id)
    }

    fn user_notice(&self, restriction: &Restriction) -> String {
        format!(
            "You are restricted from using this bot for `{}` {}. {}",
            restriction.reason,
            restriction.until_phrase(),
            self.config.appeal_note,
        )
    }

    fn guild_notice(&self, restriction: &Restriction) -> String {
        let mut notice = format!(
            "This server is restricted from using this bot for `{}` {}.",
            restriction.reason,
            restriction.until_phrase(),
        );
        if let Some(invite) = &self.config.support_invite {
            notice.push_str(&format!(
                " If you wish to appeal, please join the support server: {invite}"
            ));
        }
        notice
    }
}

impl std::fmt::Debug for AccessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessGate")
            .field("cached", &self.cache.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
