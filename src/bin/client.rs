//! Cache client.
//!
//! This binary provides a CLI for interacting with a running cache server
//! through a `CacheManager` over a `RemoteStore`.

use clap::Parser;
use std::process;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use pcache::cli::{Cli, ClientCommand};
use pcache::{CacheConfig, CacheManager, KeyLock, RemoteStore, Value};

pub fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();

    let addr = args.addr();
    let store = match RemoteStore::connect(addr.as_str()) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Failed to connect to server at {}: {}", addr, e);
            eprintln!("Make sure the server is running with: cargo run --bin pcache-server");
            process::exit(1);
        }
    };

    match args.command {
        ClientCommand::Ping => {
            store.ping()?;
            println!("PONG");
        }

        ClientCommand::Stats => {
            let line = store.stats()?;
            println!("Cache Statistics:");
            for part in line.split_whitespace() {
                if let Some((key, value)) = part.split_once(':') {
                    println!("  {}: {}", key, value);
                }
            }
        }

        command => {
            let config = CacheConfig::new().namespace(args.namespace).build();
            let cache = CacheManager::new(store, config);
            run(&cache, command)?;
        }
    }

    Ok(())
}

fn run(cache: &CacheManager, command: ClientCommand) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        ClientCommand::Get { key } => match cache.get::<Value>(&key) {
            Some(Value::Text(text)) => println!("{}", text),
            Some(Value::Null) | None => println!("Key '{}' not found", key),
            Some(other) => println!("{:?}", other),
        },

        ClientCommand::Put {
            key,
            value,
            ttl_secs,
        } => {
            match ttl_secs {
                Some(secs) => cache.put_with_ttl(&key, &value, Duration::from_secs(secs))?,
                None => cache.put(&key, &value)?,
            }
            println!("Stored key '{}'", key);
        }

        ClientCommand::Remove { key } => {
            cache.remove(&key)?;
            println!("Removed key '{}'", key);
        }

        ClientCommand::Incr { key, delta } => {
            println!("{}", cache.increment(&key, delta)?);
        }

        ClientCommand::Contains { key } => {
            println!("{}", cache.contains(&key));
        }

        ClientCommand::Lock { key, duration_ms } => {
            if KeyLock::new(cache.clone()).lock(&key, duration_ms)? {
                println!("Locked '{}'", key);
            } else {
                println!("'{}' is already locked", key);
                process::exit(2);
            }
        }

        ClientCommand::Flush => {
            cache.flush_cache()?;
            println!("Flushed namespace '{}'", cache.namespace());
        }

        ClientCommand::Ping | ClientCommand::Stats => {}
    }
    Ok(())
}
