//! Subscription lifecycle example.
//!
//! Walks through a trial, a tampered record and the resulting lockout
//! using in-memory storage.
//!
//! # Running
//!
//! ```bash
//! cargo run --example subscription_flow
//! ```
//!
//! # Note
//!
//! In production, `app_secret` should be a compile-time constant. It still
//! ships inside the binary, so the server must remain the authority on
//! what a customer has paid for.

use std::sync::Arc;
use subguard::{GuardConfig, GuardError, MemoryStorage, Storage, SubscriptionGuard, SubscriptionManager};

const APP_SECRET: &str = "example-app-secret";

fn main() {
    let config = match GuardConfig::for_local_host(APP_SECRET) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let storage = Arc::new(MemoryStorage::new());
    let guard = match SubscriptionGuard::new(config, storage.clone()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to create guard: {}", e);
            std::process::exit(1);
        }
    };
    let manager = SubscriptionManager::new(guard);
    let key = manager.guard().storage_key();

    println!("Device fingerprint: {}", manager.guard().device_fingerprint());
    println!("Storage key: {}", key);

    match manager.start_trial("premium") {
        Ok(trial) => println!("Trial started, expires {:?}", trial.expires_at),
        Err(e) => report(&e),
    }
    println!("nutrition_plan unlocked: {}", manager.has_feature("nutrition_plan"));

    match manager.start_trial("premium") {
        Ok(_) => println!("Second trial unexpectedly allowed"),
        Err(e) => report(&e),
    }

    // Simulate someone hand-editing local storage.
    if let Ok(Some(raw)) = storage.get(&key) {
        let _ = storage.set(&key, &raw.replace("\"premium\"", "\"pro\""));
    }

    for _ in 0..4 {
        match manager.guard().secure_retrieve(&key) {
            Ok(Some(data)) => println!("Read plan {:?}", data.get("planId")),
            Ok(None) => println!("No subscription stored"),
            Err(e) => report(&e),
        }
    }

    println!("Locked out: {}", manager.guard().is_security_blocked());
}

fn report(e: &GuardError) {
    match e {
        GuardError::AccessBlocked => {
            eprintln!("Access blocked after repeated tampering, try again in 24 hours");
        }
        GuardError::RateLimitExceeded { retry_after_secs, .. } => {
            eprintln!("Slow down, retry in {} seconds", retry_after_secs);
        }
        GuardError::TrialAlreadyUsed => {
            eprintln!("The free trial has already been used on this device");
        }
        e if e.is_tamper() => {
            eprintln!("Stored subscription rejected: {}", e);
        }
        e => eprintln!("Error: {}", e),
    }
}
