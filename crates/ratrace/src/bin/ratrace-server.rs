//! Development server: in-memory store, built-in profession table.
//!
//! ```sh
//! RUST_LOG=info RATRACE_ADDR=0.0.0.0:8080 cargo run --bin ratrace-server
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use ratrace::{RatraceError, RatraceServerBuilder};
use ratrace_protocol::Profession;
use ratrace_room::StaticCatalog;
use ratrace_storage::MemoryStore;
use tracing_subscriber::EnvFilter;

fn catalog() -> StaticCatalog {
    StaticCatalog::new([
        Profession {
            id: 1,
            name: "Engineer".into(),
            starting_balance: 3000,
            credits: BTreeMap::from([
                ("car".into(), 4000),
                ("education".into(), 6000),
            ]),
        },
        Profession {
            id: 2,
            name: "Teacher".into(),
            starting_balance: 2000,
            credits: BTreeMap::from([("education".into(), 3000)]),
        },
        Profession {
            id: 3,
            name: "Doctor".into(),
            starting_balance: 5000,
            credits: BTreeMap::from([
                ("education".into(), 12000),
                ("mortgage".into(), 20000),
            ]),
        },
        Profession {
            id: 4,
            name: "Janitor".into(),
            starting_balance: 600,
            credits: BTreeMap::new(),
        },
    ])
}

#[tokio::main]
async fn main() -> Result<(), RatraceError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let addr = std::env::var("RATRACE_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:8080".to_string());

    let server = RatraceServerBuilder::new()
        .bind(&addr)
        .build(Arc::new(MemoryStore::new()), Arc::new(catalog()))
        .await?;

    tracing::info!(%addr, "ratrace dev server starting");
    server.run().await
}
