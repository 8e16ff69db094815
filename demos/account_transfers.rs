//! Concurrent account transfers serialized per account.
//!
//! Run with: cargo run --example account_transfers

use lockcraft::core::EntityLocker;
use lockcraft::sync::StripedEntityLocker;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::thread;

fn main() {
    println!("Per-account locking with StripedEntityLocker\n");

    let locker = Arc::new(StripedEntityLocker::<String>::new());
    let balances = Arc::new(Mutex::new(HashMap::from([
        ("alice".to_string(), 1_000_i64),
        ("bob".to_string(), 1_000_i64),
        ("carol".to_string(), 1_000_i64),
    ])));

    // Eight tellers deposit and withdraw against three accounts. Each
    // account's updates are serialized by its entity lock; different
    // accounts proceed in parallel.
    let accounts = ["alice", "bob", "carol"];
    let handles: Vec<_> = (0..8)
        .map(|teller| {
            let locker = Arc::clone(&locker);
            let balances = Arc::clone(&balances);
            thread::spawn(move || {
                for i in 0..100 {
                    let account = accounts[(teller + i) % accounts.len()].to_string();
                    let amount = if i % 2 == 0 { 25 } else { -25 };
                    locker
                        .run(&account, || {
                            let mut balances = balances.lock().unwrap();
                            let balance = balances.get_mut(&account).unwrap();
                            *balance += amount;
                            Ok(())
                        })
                        .unwrap();
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    println!("Final balances (each started at 1000):");
    for account in accounts {
        let balances = balances.lock().unwrap();
        println!("  {:<6} {}", account, balances[account]);
    }

    println!(
        "\nLive lock-map entries after the run: {}",
        locker.entry_count()
    );
    println!("{}", locker);
}
