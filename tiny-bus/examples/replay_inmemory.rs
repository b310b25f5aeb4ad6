/// TinyBus（内存版）示例
/// 展示 订阅 -> 发布 -> 失败重试与错误回调 -> 按 id 重放 的完整流程
use anyhow::Result as AnyResult;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tiny_bus::{
    ErrorStrategy, SubscriberMode, Subscription, TinyBus, TinyBusConfig, args, hook, subscriber,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> AnyResult<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tiny_bus=debug"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let bus: TinyBus = TinyBus::new(
        TinyBusConfig::builder()
            .context(json!({ "service": "orders" }))
            .subscriber_mode(SubscriberMode::Multiple)
            .error_strategy(ErrorStrategy::ContinueOnError)
            .max_retries(2)
            .retry_interval(Duration::from_millis(50))
            .debug(true)
            .on_subscribe(hook::subscription(|name, id| async move {
                println!("subscribed {id} to {name}");
                anyhow::Ok(())
            }))
            .build(),
    )?;

    // ============================================================================
    // 订阅者
    // ============================================================================

    bus.on(
        "order::placed",
        Subscription::builder()
            .on_callback(subscriber::callback(|id, ctx, args| async move {
                println!("[{id}] ctx={ctx:?} args={args:?}");
                anyhow::Ok(())
            }))
            .priority(10)
            .build(),
    )
    .await?;

    // 前两次失败，第三次成功
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    bus.on(
        "order::placed",
        Subscription::builder()
            .on_callback(subscriber::callback(move |id, _ctx, _args| {
                let counter = counter.clone();
                async move {
                    let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        anyhow::bail!("[{id}] mailer unavailable (attempt {n})");
                    }
                    println!("[{id}] mail sent on attempt {n}");
                    anyhow::Ok(())
                }
            }))
            .on_error(subscriber::on_error(|payload| {
                eprintln!("giving up: {}", payload.error);
            }))
            .build(),
    )
    .await?;

    // ============================================================================
    // 发布与重放
    // ============================================================================

    let event_id = bus
        .emit("order::placed", args![{ "order": 42, "total": 99.5 }])
        .await?
        .ok_or_else(|| anyhow::anyhow!("event was not persisted"))?;
    println!("persisted as {event_id}");

    if let Err(err) = bus.emit("order::placed", args![{ "order": 42, "total": 99.5 }]).await {
        println!("rejected: {err}");
    }

    bus.replay(&event_id).await?;
    println!("replayed {event_id}; mailer attempts so far: {}", attempts.load(Ordering::SeqCst));

    Ok(())
}
