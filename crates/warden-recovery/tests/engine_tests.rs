//! End-to-end tests of the recovery engine: routing, backfill, suggestions
//! and incidents driven through the public surface with recorded
//! collaborators.

use pretty_assertions::{assert_eq, assert_ne};
use std::sync::Arc;
use std::time::Duration;
use warden_core::{
    ArgValue, CommandFailure, CommandRegistry, CommandSpec, DomainSignal, InteractionEvent,
    InteractionInput, RestrictionScope, Snowflake, StatusGlyph,
};
use warden_gate::{AccessGate, GateConfig};
use warden_recovery::{
    IncidentService, RecoveryAction, RecoveryConfig, RecoveryEngine, WatchToggle,
};
use warden_test_utils::{
    guild_ctx, sample_registry, MemoryIncidentStore, MemoryRestrictionStore, RecordingFeed,
    RecordingTransport, ScriptedDispatcher,
};

struct Harness {
    gate: Arc<AccessGate>,
    transport: Arc<RecordingTransport>,
    feed: Arc<RecordingFeed>,
    dispatcher: Arc<ScriptedDispatcher>,
    incident_store: Arc<MemoryIncidentStore>,
    incidents: Arc<IncidentService>,
    engine: RecoveryEngine,
}

async fn harness() -> Harness {
    harness_with_registry(sample_registry()).await
}

async fn harness_with_registry(registry: CommandRegistry) -> Harness {
    let restriction_store = Arc::new(MemoryRestrictionStore::new());
    let transport = Arc::new(RecordingTransport::new());
    let gate = Arc::new(AccessGate::new(
        restriction_store,
        transport.clone(),
        GateConfig::new(),
    ));
    gate.load().await.unwrap();

    let incident_store = Arc::new(MemoryIncidentStore::new());
    let feed = Arc::new(RecordingFeed::new());
    let incidents = Arc::new(IncidentService::new(
        incident_store.clone(),
        feed.clone(),
        transport.clone(),
    ));
    let dispatcher = Arc::new(ScriptedDispatcher::new());

    let engine = RecoveryEngine::new(
        gate.clone(),
        Arc::new(registry),
        dispatcher.clone(),
        transport.clone(),
        incidents.clone(),
        RecoveryConfig::new(),
    );

    Harness {
        gate,
        transport,
        feed,
        dispatcher,
        incident_store,
        incidents,
        engine,
    }
}

fn owner_event(affordance: warden_core::AffordanceId, input: InteractionInput) -> InteractionEvent {
    InteractionEvent {
        affordance,
        actor: Snowflake(1),
        input,
    }
}

#[tokio::test]
async fn missing_argument_backfill_completes_with_default() {
    let h = harness().await;
    let ctx = guild_ctx(1, 2).with_command("greet");

    let action = h
        .engine
        .handle_failure(
            &ctx,
            CommandFailure::MissingArgument {
                param: "target".to_string(),
            },
        )
        .await;
    let RecoveryAction::BackfillStarted { affordance } = action else {
        panic!("expected a backfill session, got {action:?}");
    };
    assert_eq!(h.engine.session_count(), 1);

    // The selectable list shows `target` still required, `repeat` untouched.
    let (_, content, spec) = h.transport.last_presented().unwrap();
    assert!(content.contains("**target**"));
    let entries = spec.select.unwrap().entries;
    assert_eq!(entries[0].glyph, StatusGlyph::StillRequired);
    assert_eq!(entries[1].glyph, StatusGlyph::NotYetNeeded);

    // Selecting `target` opens the single-field prompt.
    h.engine
        .handle_interaction(owner_event(
            affordance,
            InteractionInput::Select {
                value: "target".to_string(),
            },
        ))
        .await;
    let (prompted, prompt) = h.transport.last_prompt().unwrap();
    assert_eq!(prompted, affordance);
    assert_eq!(prompt.title, "target");

    // Supplying the one missing value completes and re-invokes with the
    // optional parameter's default.
    h.engine
        .handle_interaction(owner_event(
            affordance,
            InteractionInput::Submit {
                text: "world".to_string(),
            },
        ))
        .await;

    assert_eq!(h.engine.session_count(), 0);
    let invocations = h.dispatcher.invocations();
    assert_eq!(invocations.len(), 1);
    let (command, args) = &invocations[0];
    assert_eq!(command, "greet");
    assert_eq!(
        args.keyword.get("target"),
        Some(&ArgValue::Str("world".to_string()))
    );
    assert_eq!(args.keyword.get("repeat"), Some(&ArgValue::Int(5)));
    assert_eq!(
        h.transport.deleted.lock().unwrap().len(),
        1,
        "session message deleted on completion"
    );
}

#[tokio::test]
async fn backfill_rejects_non_owner_interactions() {
    let h = harness().await;
    let ctx = guild_ctx(1, 2).with_command("greet");

    let RecoveryAction::BackfillStarted { affordance } = h
        .engine
        .handle_failure(
            &ctx,
            CommandFailure::MissingArgument {
                param: "target".to_string(),
            },
        )
        .await
    else {
        panic!("expected a backfill session");
    };

    h.engine
        .handle_interaction(InteractionEvent {
            affordance,
            actor: Snowflake(999),
            input: InteractionInput::Select {
                value: "target".to_string(),
            },
        })
        .await;

    assert!(h.transport.last_prompt().is_none(), "no prompt for intruders");
    assert_eq!(h.engine.session_count(), 1, "session unaffected");
}

#[tokio::test]
async fn conversion_failure_abandons_and_reroutes() {
    let h = harness().await;
    let ctx = guild_ctx(1, 2).with_command("greet");

    let RecoveryAction::BackfillStarted { affordance } = h
        .engine
        .handle_failure(
            &ctx,
            CommandFailure::MissingArgument {
                param: "target".to_string(),
            },
        )
        .await
    else {
        panic!("expected a backfill session");
    };

    h.engine
        .handle_interaction(owner_event(
            affordance,
            InteractionInput::Select {
                value: "repeat".to_string(),
            },
        ))
        .await;
    h.engine
        .handle_interaction(owner_event(
            affordance,
            InteractionInput::Submit {
                text: "definitely-not-a-number".to_string(),
            },
        ))
        .await;

    assert_eq!(h.engine.session_count(), 0, "session abandoned");
    assert_eq!(h.dispatcher.invocation_count(), 0, "never re-invoked");
    assert_eq!(h.transport.deleted.lock().unwrap().len(), 1);
    // The conversion failure re-entered the router as a fresh user-input
    // error and was answered with its own message.
    let (_, reply, _) = h.transport.last_reply().unwrap();
    assert!(reply.contains("definitely-not-a-number"));
}

#[tokio::test]
async fn owner_cancel_abandons_without_reinvocation() {
    let h = harness().await;
    let ctx = guild_ctx(1, 2).with_command("greet");

    let RecoveryAction::BackfillStarted { affordance } = h
        .engine
        .handle_failure(
            &ctx,
            CommandFailure::MissingArgument {
                param: "target".to_string(),
            },
        )
        .await
    else {
        panic!("expected a backfill session");
    };

    h.engine
        .handle_interaction(owner_event(
            affordance,
            InteractionInput::Button {
                id: "backfill:cancel".to_string(),
            },
        ))
        .await;

    assert_eq!(h.engine.session_count(), 0);
    assert_eq!(h.dispatcher.invocation_count(), 0);
}

#[tokio::test]
async fn timeout_releases_the_session_silently() {
    let h = harness().await;
    let ctx = guild_ctx(1, 2).with_command("greet");

    let RecoveryAction::BackfillStarted { affordance } = h
        .engine
        .handle_failure(
            &ctx,
            CommandFailure::MissingArgument {
                param: "target".to_string(),
            },
        )
        .await
    else {
        panic!("expected a backfill session");
    };

    let replies_before = h.transport.reply_count();
    h.engine.expire(affordance).await;

    assert_eq!(h.engine.session_count(), 0);
    assert_eq!(h.transport.reply_count(), replies_before, "no timeout message");
    assert_eq!(
        h.transport.deleted.lock().unwrap().len(),
        0,
        "the platform cleans the stale widget itself"
    );
}

#[tokio::test]
async fn missing_attachment_gets_static_guidance_only() {
    let h = harness().await;
    let ctx = guild_ctx(1, 2).with_command("greet");

    let action = h
        .engine
        .handle_failure(
            &ctx,
            CommandFailure::MissingAttachment {
                param: "image".to_string(),
            },
        )
        .await;

    assert_eq!(action, RecoveryAction::Replied);
    assert_eq!(h.engine.session_count(), 0, "attachments never backfill");
    let (_, reply, _) = h.transport.last_reply().unwrap();
    assert!(reply.contains("**image**"));
}

#[tokio::test]
async fn unknown_command_offers_the_closest_runnable_match() {
    let h = harness().await;
    let ctx = guild_ctx(1, 2).with_invoked_with("gret");

    let action = h
        .engine
        .handle_failure(
            &ctx,
            CommandFailure::UnknownCommand {
                attempted: "gret".to_string(),
            },
        )
        .await;
    assert_eq!(
        action,
        RecoveryAction::SuggestionOffered {
            command: "greet".to_string()
        }
    );

    let (presented, content, _) = h.transport.last_presented().unwrap();
    assert!(content.contains("`gret`"));
    assert!(content.contains("`greet`"));

    // Accepting re-runs full dispatch with the suggested command.
    h.engine
        .handle_interaction(owner_event(
            presented.affordance,
            InteractionInput::Button {
                id: "suggest:run".to_string(),
            },
        ))
        .await;
    let invocations = h.dispatcher.invocations();
    assert_eq!(invocations.len(), 1);
    assert_eq!(invocations[0].0, "greet");
    assert_eq!(h.engine.session_count(), 0);
}

#[tokio::test]
async fn suggestion_never_offers_a_command_the_issuer_cannot_run() {
    let h = harness().await;
    h.dispatcher
        .fail_checks_with("greet", || CommandFailure::NotOwner);
    let ctx = guild_ctx(1, 2).with_invoked_with("gret");

    let action = h
        .engine
        .handle_failure(
            &ctx,
            CommandFailure::UnknownCommand {
                attempted: "gret".to_string(),
            },
        )
        .await;

    assert_eq!(action, RecoveryAction::Silenced);
    assert!(h.transport.last_presented().is_none());
    assert_eq!(h.transport.reply_count(), 0, "check failures are swallowed");
}

#[tokio::test]
async fn restricted_issuer_gets_no_suggestion() {
    let h = harness().await;
    h.gate
        .add(Snowflake(1), RestrictionScope::User, "spam", None)
        .await
        .unwrap();
    let ctx = guild_ctx(1, 2).with_invoked_with("gret");

    let action = h
        .engine
        .handle_failure(
            &ctx,
            CommandFailure::UnknownCommand {
                attempted: "gret".to_string(),
            },
        )
        .await;

    assert_eq!(action, RecoveryAction::Silenced);
    assert!(h.transport.last_presented().is_none());
}

#[tokio::test]
async fn declined_suggestion_ends_quietly() {
    let h = harness().await;
    let ctx = guild_ctx(1, 2).with_invoked_with("pnig");

    let action = h
        .engine
        .handle_failure(
            &ctx,
            CommandFailure::UnknownCommand {
                attempted: "pnig".to_string(),
            },
        )
        .await;
    assert!(matches!(action, RecoveryAction::SuggestionOffered { .. }));
    let (presented, _, _) = h.transport.last_presented().unwrap();

    let replies_before = h.transport.reply_count();
    h.engine
        .handle_interaction(owner_event(
            presented.affordance,
            InteractionInput::Button {
                id: "suggest:dismiss".to_string(),
            },
        ))
        .await;

    assert_eq!(h.engine.session_count(), 0);
    assert_eq!(h.dispatcher.invocation_count(), 0);
    assert_eq!(h.transport.reply_count(), replies_before);
}

#[tokio::test]
async fn failed_reinvocation_reenters_the_router() {
    let h = harness().await;
    h.dispatcher
        .fail_invoke_with("greet", || CommandFailure::Internal(anyhow::anyhow!("boom")));
    let ctx = guild_ctx(1, 2).with_invoked_with("gret");

    let action = h
        .engine
        .handle_failure(
            &ctx,
            CommandFailure::UnknownCommand {
                attempted: "gret".to_string(),
            },
        )
        .await;
    assert!(matches!(action, RecoveryAction::SuggestionOffered { .. }));
    let (presented, _, _) = h.transport.last_presented().unwrap();

    h.engine
        .handle_interaction(owner_event(
            presented.affordance,
            InteractionInput::Button {
                id: "suggest:run".to_string(),
            },
        ))
        .await;

    // The forced re-invocation blew up; the failure was classified instead
    // of propagating, so an incident now exists.
    assert_eq!(h.incident_store.row_count(), 1);
    assert_eq!(h.feed.published_count(), 1);
}

#[tokio::test]
async fn expected_failures_reply_with_their_own_text() {
    let h = harness().await;
    let ctx = guild_ctx(1, 2).with_command("greet");

    let action = h
        .engine
        .handle_failure(
            &ctx,
            CommandFailure::Cooldown {
                retry_after: Duration::from_secs(30),
            },
        )
        .await;

    assert_eq!(action, RecoveryAction::Replied);
    let (_, reply, delete_after) = h.transport.last_reply().unwrap();
    assert!(reply.contains("30s"));
    assert_eq!(delete_after, Some(Duration::from_secs(30)));
}

#[tokio::test]
async fn silent_conditions_stay_silent() {
    let h = harness().await;
    let ctx = guild_ctx(1, 2).with_command("greet");

    assert_eq!(
        h.engine
            .handle_failure(&ctx, CommandFailure::AccessDenied)
            .await,
        RecoveryAction::Skipped
    );
    assert_eq!(
        h.engine
            .handle_failure(
                &ctx,
                CommandFailure::CheckFailed {
                    reason: "custom guard".to_string()
                }
            )
            .await,
        RecoveryAction::Silenced
    );
    assert_eq!(
        h.engine
            .handle_failure(&ctx, CommandFailure::Domain(DomainSignal::Cancelled))
            .await,
        RecoveryAction::Silenced
    );
    assert_eq!(h.transport.reply_count(), 0);
    assert_eq!(h.incident_store.row_count(), 0);
}

#[tokio::test]
async fn mapped_domain_signal_gets_its_tailored_message() {
    let h = harness().await;
    let ctx = guild_ctx(1, 2).with_command("greet");

    let action = h
        .engine
        .handle_failure(
            &ctx,
            CommandFailure::Domain(DomainSignal::SearchMiss {
                query: "renoir".to_string(),
            }),
        )
        .await;

    assert_eq!(action, RecoveryAction::Replied);
    let (_, reply, _) = h.transport.last_reply().unwrap();
    assert!(reply.contains("renoir"));
}

#[tokio::test]
async fn commands_with_dedicated_handlers_are_skipped() {
    let mut registry = sample_registry();
    registry.insert(CommandSpec::new("sync", "Sync state").with_error_handler());
    let h = harness_with_registry(registry).await;
    let ctx = guild_ctx(1, 2).with_command("sync");

    let action = h
        .engine
        .handle_failure(&ctx, CommandFailure::Internal(anyhow::anyhow!("boom")))
        .await;

    assert_eq!(action, RecoveryAction::Skipped);
    assert_eq!(h.incident_store.row_count(), 0);
    assert_eq!(h.transport.reply_count(), 0);
}

#[tokio::test]
async fn wrapped_failures_are_unwrapped_once_before_routing() {
    let h = harness().await;
    let ctx = guild_ctx(1, 2).with_command("greet");

    let action = h
        .engine
        .handle_failure(
            &ctx,
            CommandFailure::Wrapped(Box::new(CommandFailure::Disabled)),
        )
        .await;

    assert_eq!(action, RecoveryAction::Replied);
    let (_, reply, _) = h.transport.last_reply().unwrap();
    assert!(reply.contains("disabled"));
}

#[tokio::test]
async fn identical_failures_share_one_incident_until_fixed() {
    let h = harness().await;
    let ctx = guild_ctx(1, 2).with_command("greet");

    let first = h
        .engine
        .handle_failure(&ctx, CommandFailure::Internal(anyhow::anyhow!("boom")))
        .await;
    let RecoveryAction::IncidentReported { id: first_id } = first else {
        panic!("expected an incident, got {first:?}");
    };

    let second = h
        .engine
        .handle_failure(&ctx, CommandFailure::Internal(anyhow::anyhow!("boom")))
        .await;
    assert_eq!(
        second,
        RecoveryAction::IncidentReported { id: first_id },
        "identical failure reuses the open incident"
    );
    assert_eq!(h.incident_store.row_count(), 1);
    assert_eq!(h.feed.published_count(), 1, "no re-alert on reuse");

    h.incidents.mark_fixed(first_id).await.unwrap();

    let third = h
        .engine
        .handle_failure(&ctx, CommandFailure::Internal(anyhow::anyhow!("boom")))
        .await;
    let RecoveryAction::IncidentReported { id: third_id } = third else {
        panic!("expected an incident, got {third:?}");
    };
    assert_ne!(third_id, first_id, "a fixed incident no longer absorbs");
    assert_eq!(h.incident_store.row_count(), 2);
}

#[tokio::test]
async fn mark_fixed_notifies_watchers_and_clears_rows() {
    let h = harness().await;
    let ctx = guild_ctx(1, 2).with_command("greet");

    let RecoveryAction::IncidentReported { id } = h
        .engine
        .handle_failure(&ctx, CommandFailure::Internal(anyhow::anyhow!("boom")))
        .await
    else {
        panic!("expected an incident");
    };

    for watcher in [21, 22, 23] {
        h.incidents
            .toggle_watch(id, Snowflake(watcher))
            .await
            .unwrap();
    }
    h.transport.set_unreachable(Snowflake(22));

    let report = h.incidents.mark_fixed(id).await.unwrap();
    assert_eq!(report.watchers, 3);
    assert_eq!(report.delivered, 2, "unreachable watcher skipped");
    assert_eq!(h.transport.dm_count(), 2);
    assert_eq!(
        h.incident_store.watch_count(id),
        0,
        "watch rows cleared regardless of delivery"
    );
    assert!(h.incidents.get(id).await.unwrap().unwrap().fixed);
}

#[tokio::test]
async fn incident_detail_affordance_serves_any_requester() {
    let h = harness().await;
    let ctx = guild_ctx(1, 2).with_command("greet");

    assert!(matches!(
        h.engine
            .handle_failure(&ctx, CommandFailure::Internal(anyhow::anyhow!("boom")))
            .await,
        RecoveryAction::IncidentReported { .. }
    ));
    let (presented, content, _) = h.transport.last_presented().unwrap();
    assert!(content.contains("borked"));

    // A bystander, not the triggering user, asks for details.
    h.engine
        .handle_interaction(InteractionEvent {
            affordance: presented.affordance,
            actor: Snowflake(42),
            input: InteractionInput::Button {
                id: "incident:details".to_string(),
            },
        })
        .await;
    let (_, viewer, details) = h.transport.last_private_response().unwrap();
    assert_eq!(viewer, Snowflake(42));
    assert!(details.contains("boom"));
    assert!(details.contains("is not** fixed"));

    // The same bystander toggles a watch on and off.
    let RecoveryAction::IncidentReported { id } = h
        .engine
        .handle_failure(&ctx, CommandFailure::Internal(anyhow::anyhow!("boom")))
        .await
    else {
        panic!("expected the reused incident");
    };
    h.engine
        .handle_interaction(InteractionEvent {
            affordance: presented.affordance,
            actor: Snowflake(42),
            input: InteractionInput::Button {
                id: "incident:watch".to_string(),
            },
        })
        .await;
    assert_eq!(h.incident_store.watch_count(id), 1);
    h.engine
        .handle_interaction(InteractionEvent {
            affordance: presented.affordance,
            actor: Snowflake(42),
            input: InteractionInput::Button {
                id: "incident:watch".to_string(),
            },
        })
        .await;
    assert_eq!(h.incident_store.watch_count(id), 0);
}

#[tokio::test]
async fn mark_fixed_requires_an_existing_incident() {
    let h = harness().await;
    let err = h
        .incidents
        .mark_fixed(warden_core::IncidentId(404))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        warden_recovery::IncidentError::NotFound { .. }
    ));
}

#[tokio::test]
async fn watch_toggle_round_trip() {
    let h = harness().await;
    let ctx = guild_ctx(1, 2).with_command("greet");
    let RecoveryAction::IncidentReported { id } = h
        .engine
        .handle_failure(&ctx, CommandFailure::Internal(anyhow::anyhow!("boom")))
        .await
    else {
        panic!("expected an incident");
    };

    assert_eq!(
        h.incidents.toggle_watch(id, Snowflake(5)).await.unwrap(),
        WatchToggle::Registered
    );
    assert_eq!(
        h.incidents.toggle_watch(id, Snowflake(5)).await.unwrap(),
        WatchToggle::Unregistered
    );
}

#[tokio::test]
async fn shortfall_reply_is_a_bulleted_list() {
    let h = harness().await;
    let ctx = guild_ctx(1, 2).with_command("greet");

    let action = h
        .engine
        .handle_failure(
            &ctx,
            CommandFailure::BotMissingPermissions {
                missing: vec!["manage_messages".to_string(), "embed_links".to_string()],
            },
        )
        .await;

    assert_eq!(action, RecoveryAction::Replied);
    let (_, reply, _) = h.transport.last_reply().unwrap();
    assert!(reply.starts_with("I am missing the following permissions"));
    assert!(reply.contains("\n- Manage messages"));
    assert!(reply.contains("\n- Embed links"));
}
