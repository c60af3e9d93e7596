//! Kafka consumer feeding a validated endpoint, republishing to NATS.
//!
//! Run with (Kafka on localhost:9092, NATS on localhost:4222):
//!   RUST_LOG=info cargo run --example consumer
//!
//! Ctrl-C stops the loop after the message in flight.

use std::time::Instant;

use bytes::Bytes;
use switchyard::hooks::Hooks;
use switchyard::kafka::{Consumer, ConsumerConfig, Message};
use switchyard::middleware::{self, Validate};
use switchyard::nats::{self, NatsConfig, Publisher};
use switchyard::{BoxedEndpoint, Context, Endpoint, Error, shutdown_signal};
use tracing::info;
use tracing_subscriber::EnvFilter;

struct Order {
    id: String,
    quantity: u32,
}

impl Validate for Order {
    fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("id is required".into());
        }
        if self.quantity == 0 {
            return Err("quantity must be positive".into());
        }
        Ok(())
    }
}

/// `"<id>:<quantity>"`
fn decode_order(_ctx: &Context, msg: &Message) -> Result<Order, switchyard::BoxError> {
    let raw = std::str::from_utf8(msg.value.as_deref().unwrap_or_default())?;
    let (id, quantity) = raw.split_once(':').ok_or("expected <id>:<quantity>")?;
    Ok(Order { id: id.to_owned(), quantity: quantity.parse()? })
}

#[derive(Clone, Copy)]
struct Started(Instant);

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let nats_config = NatsConfig { subject_prefix: "gb".into(), ..Default::default() };
    let client = nats::connect(&nats_config).await?;
    let publisher = Publisher::from_config(client, &nats_config, "orders.accepted")
        .encoder(|_ctx: &Context, msg: &mut nats::Message, order: Order| {
            msg.data = Bytes::from(format!("{}:{}", order.id, order.quantity));
            Ok(())
        })
        .build()?;

    let accept = BoxedEndpoint::new(move |ctx: Context, order: Order| {
        let publisher = publisher.clone();
        async move {
            let id = order.id.clone();
            publisher.call(ctx, order).await?;
            Ok::<_, Error>(id)
        }
    });
    let stack = middleware::chain(vec![middleware::trace("accept-order"), middleware::validate()]);

    let hooks = Hooks::builder()
        .before(|ctx, _msg: &Message| Ok(ctx.with_value(Started(Instant::now()))))
        .after(|ctx: Context, msg: &Message, id: &String| {
            let elapsed = ctx.value::<Started>().map(|s| s.0.elapsed());
            info!(order = %id, offset = msg.offset, ?elapsed, "order accepted");
            ctx
        })
        .build();

    let config = ConsumerConfig { topic: "orders".into(), ..Default::default() };
    let consumer = Consumer::builder(config)
        .decoder(decode_order)
        .endpoint(stack(accept))
        .hooks(hooks)
        .build()?;

    consumer.run_until(shutdown_signal()).await;
    Ok(())
}
