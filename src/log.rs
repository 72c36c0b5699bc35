use tracing_subscriber::{
    fmt::Layer, prelude::__tracing_subscriber_SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

pub fn init() {
    tracing_subscriber::registry()
        .with(Layer::default().json().flatten_event(true))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
