//! A small request-handling app wired through a provider.
//!
//! Run with `RUST_LOG=debug cargo run --example basic` to watch resolution.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;
use wasil::prelude::*;

struct Settings {
    dsn: String,
}

struct Pool {
    dsn: String,
}

impl Dispose for Pool {
    fn dispose(&self) -> Result<(), BoxError> {
        info!(dsn = %self.dsn, "Closing pool");
        Ok(())
    }
}

#[derive(Injectable)]
struct UnitOfWork {
    pool: Arc<Pool>,
    #[inject(default)]
    statements: AtomicU64,
}

impl Dispose for UnitOfWork {
    fn dispose(&self) -> Result<(), BoxError> {
        info!(statements = self.statements.load(Ordering::Relaxed), "Committing unit of work");
        Ok(())
    }
}

#[derive(Injectable)]
struct OrderHandler {
    work: Arc<UnitOfWork>,
}

impl OrderHandler {
    fn place(&self, item: &str) {
        self.work.statements.fetch_add(1, Ordering::Relaxed);
        info!(item, dsn = %self.work.pool.dsn, "Order placed");
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let provider = ServiceCollection::new()
        .add_singleton(Service::instance(Settings {
            dsn: "postgres://localhost/shop".to_owned(),
        }))
        .add_singleton(
            Service::async_factory(vec![Param::of::<Settings>()], |mut args| {
                let settings = args.take::<Settings>();
                async move {
                    let settings = settings?;
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok::<_, BoxError>(Pool {
                        dsn: settings.dsn.clone(),
                    })
                }
            })
            .disposable(),
        )
        .add_scoped(Service::<UnitOfWork>::constructor().disposable())
        .add_transient(Service::<OrderHandler>::constructor())
        .build_provider_async()
        .await?;

    for request in ["book", "lamp"] {
        let scope = provider.create_scope();
        let first = scope.resolve_async::<OrderHandler>().await?;
        let second = scope.resolve_async::<OrderHandler>().await?;
        first.place(request);
        second.place(request);
        scope.dispose()?;
    }

    provider.dispose()?;
    Ok(())
}
