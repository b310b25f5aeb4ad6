use anyhow::Result as AnyResult;
use dashmap::DashMap;
use serde_json::{Value, json};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tiny_bus::bus::SubscriberCallback;
use tiny_bus::{
    BusError, DebugPhase, Event, EventStore, InMemoryEventStore, SubscriberMode, Subscription,
    TinyBus, TinyBusConfig, args, hook, subscriber,
};

type Received = Arc<Mutex<Vec<Vec<Value>>>>;

fn collecting(received: &Received) -> SubscriberCallback<Value> {
    let received = received.clone();
    subscriber::callback(move |_id, _ctx, args| {
        let received = received.clone();
        async move {
            received.lock().unwrap().push(args);
            anyhow::Ok(())
        }
    })
}

fn subscription(callback: SubscriberCallback<Value>) -> Subscription<Value> {
    Subscription::builder().on_callback(callback).build()
}

#[tokio::test]
async fn replay_redelivers_without_persisting_again() -> AnyResult<()> {
    let store = Arc::new(InMemoryEventStore::<Value>::new());
    let bus: TinyBus = TinyBus::with_store(
        TinyBusConfig::builder()
            .unique_events(false)
            .subscriber_mode(SubscriberMode::Multiple)
            .build(),
        store.clone(),
    )?;
    let received = Received::default();
    bus.on("ping", subscription(collecting(&received))).await?;

    let id = bus.emit("ping", args![1]).await?.expect("event persisted");
    assert_eq!(store.len(), 1);

    bus.replay(&id).await?;

    assert_eq!(store.len(), 1);
    assert_eq!(*received.lock().unwrap(), vec![vec![json!(1)], vec![json!(1)]]);
    Ok(())
}

#[tokio::test]
async fn replay_in_single_mode_consumes_current_subscriber() -> AnyResult<()> {
    let bus: TinyBus = TinyBus::new(TinyBusConfig::builder().unique_events(false).build())?;
    let first = Received::default();
    let second = Received::default();
    bus.on("ping", subscription(collecting(&first))).await?;
    bus.on("ping", subscription(collecting(&second))).await?;

    let id = bus.emit("ping", args![1]).await?.expect("event persisted");
    bus.replay(&id).await?;

    assert_eq!(first.lock().unwrap().len(), 1);
    assert_eq!(*second.lock().unwrap(), vec![vec![json!(1)]]);
    assert!(!bus.has_subscribers("ping"));
    Ok(())
}

#[tokio::test]
async fn replay_bypasses_uniqueness_checks() -> AnyResult<()> {
    let checks = Arc::new(AtomicUsize::new(0));
    let counter = checks.clone();
    let bus: TinyBus = TinyBus::new(
        TinyBusConfig::builder()
            .subscriber_mode(SubscriberMode::Multiple)
            .on_unique_check(hook::unique_check(move |_name, _args| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { anyhow::Ok(true) }
            }))
            .build(),
    )?;
    let received = Received::default();
    bus.on("ping", subscription(collecting(&received))).await?;

    let id = bus.emit("ping", args!["x"]).await?.expect("event persisted");
    bus.replay(&id).await?;
    bus.replay(&id).await?;

    assert_eq!(checks.load(Ordering::SeqCst), 1);
    assert_eq!(received.lock().unwrap().len(), 3);
    Ok(())
}

#[tokio::test]
async fn replay_leaves_fingerprints_untouched() -> AnyResult<()> {
    let bus: TinyBus = TinyBus::new(
        TinyBusConfig::builder()
            .subscriber_mode(SubscriberMode::Multiple)
            .build(),
    )?;
    let received = Received::default();
    bus.on("ping", subscription(collecting(&received))).await?;

    let id = bus.emit("ping", args!["x"]).await?.expect("event persisted");
    bus.replay(&id).await?;

    // 重放未登记新指纹：原参数仍是重复，新参数仍可发布
    let err = bus.emit("ping", args!["x"]).await.unwrap_err();
    assert!(matches!(err, BusError::DuplicateEvent { .. }));
    bus.emit("ping", args!["y"]).await?;
    assert_eq!(received.lock().unwrap().len(), 3);
    Ok(())
}

#[tokio::test]
async fn replay_of_unknown_event_is_not_found() {
    let bus: TinyBus = TinyBus::default();
    let err = bus.replay("missing").await.unwrap_err();
    assert!(matches!(err, BusError::NotFound { ref id } if id == "missing"));
}

#[tokio::test]
async fn replay_without_subscribers_fails() -> AnyResult<()> {
    let bus: TinyBus = TinyBus::new(TinyBusConfig::builder().unique_events(false).build())?;
    let received = Received::default();
    bus.on("ping", subscription(collecting(&received))).await?;
    let id = bus.emit("ping", args![1]).await?.expect("event persisted");

    let err = bus.replay(&id).await.unwrap_err();
    assert_eq!(err.to_string(), "No subscribers for event ping");
    Ok(())
}

#[derive(Clone, Default)]
struct ExternalStore {
    events: Arc<DashMap<String, Event<Value>>>,
    persisted: Arc<AtomicUsize>,
}

fn external_config(store: &ExternalStore) -> TinyBusConfig<Value> {
    let (persist_store, restore_store) = (store.clone(), store.clone());
    TinyBusConfig::builder()
        .context(json!({"tenant": "t-1"}))
        .subscriber_mode(SubscriberMode::Multiple)
        .on_persist(hook::persist(move |event| {
            let store = persist_store.clone();
            async move {
                let n = store.persisted.fetch_add(1, Ordering::SeqCst) + 1;
                let id = format!("ext-{n}");
                store.events.insert(id.clone(), event.with_id(id.clone()));
                anyhow::Ok(id)
            }
        }))
        .on_restore(hook::restore(move |id| {
            let store = restore_store.clone();
            async move { anyhow::Ok(store.events.get(&id).map(|e| e.value().clone())) }
        }))
        .build()
}

#[tokio::test]
async fn external_persistence_hooks_replace_the_internal_store() -> AnyResult<()> {
    let external = ExternalStore::default();
    let internal = Arc::new(InMemoryEventStore::<Value>::new());
    let bus: TinyBus = TinyBus::with_store(external_config(&external), internal.clone())?;
    let received = Received::default();
    bus.on("order::placed", subscription(collecting(&received)))
        .await?;

    let id = bus
        .emit("order::placed", args![{"order": 42}])
        .await?
        .expect("event persisted");
    assert_eq!(id, "ext-1");
    assert!(internal.is_empty());

    let stored = external.events.get(&id).map(|e| e.value().clone()).expect("stored");
    assert_eq!(stored.name(), "order::placed");
    assert_eq!(stored.context(), Some(&json!({"tenant": "t-1"})));
    assert_eq!(stored.args(), &[json!({"order": 42})]);

    bus.replay(&id).await?;
    assert_eq!(external.persisted.load(Ordering::SeqCst), 1);
    assert_eq!(received.lock().unwrap().len(), 2);

    let err = bus.replay("ext-99").await.unwrap_err();
    assert!(matches!(err, BusError::NotFound { .. }));
    Ok(())
}

#[tokio::test]
async fn injected_store_receives_name_args_and_context() -> AnyResult<()> {
    let store = Arc::new(InMemoryEventStore::<Value>::new());
    let bus: TinyBus = TinyBus::with_store(
        TinyBusConfig::builder().context(json!({"app": "demo"})).build(),
        store.clone(),
    )?;
    let received = Received::default();
    bus.on("user::created", subscription(collecting(&received))).await?;

    let id = bus
        .emit("user::created", args!["alice", 7])
        .await?
        .expect("event persisted");
    let event = store.restore(&id).await?;

    assert_eq!(event.id(), id);
    assert_eq!(event.name(), "user::created");
    assert_eq!(event.args(), &[json!("alice"), json!(7)]);
    assert_eq!(event.context(), Some(&json!({"app": "demo"})));
    Ok(())
}

#[tokio::test]
async fn debug_hook_observes_phase_pairs() -> AnyResult<()> {
    let phases: Arc<Mutex<Vec<(DebugPhase, String, bool)>>> = Arc::default();
    let sink = phases.clone();
    let bus: TinyBus = TinyBus::new(
        TinyBusConfig::builder()
            .subscriber_mode(SubscriberMode::Multiple)
            .on_debug(hook::debug(move |phase, id, duration| {
                sink.lock()
                    .unwrap()
                    .push((phase, id.to_string(), duration.is_some()));
            }))
            .build(),
    )?;
    let received = Received::default();
    bus.on("ping", subscription(collecting(&received))).await?;
    let id = bus.emit("ping", args![1]).await?.expect("event persisted");
    bus.replay(&id).await?;

    let phases = phases.lock().unwrap();
    let names: Vec<DebugPhase> = phases.iter().map(|(p, _, _)| *p).collect();
    use DebugPhase::*;
    assert_eq!(
        names,
        vec![
            StartSubscribe,
            EndSubscribe,
            StartEmit,
            StartIsUnique,
            EndIsUnique,
            StartPersist,
            EndPersist,
            EndEmit,
            StartReplay,
            StartRestore,
            EndRestore,
            EndReplay,
        ]
    );
    for (phase, _, has_duration) in phases.iter() {
        assert_eq!(*has_duration, !phase.is_start(), "{phase}");
    }
    assert_eq!(phases[8].1, id);
    Ok(())
}
