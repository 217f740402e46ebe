//! The motivating scenario end to end: allocating unique tokens against a
//! store that enforces uniqueness, with collisions retried transparently by
//! a single shared policy.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use backstop::Policy;

#[derive(Debug)]
struct UniquenessViolation(u32);

impl std::fmt::Display for UniquenessViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "token {} already taken", self.0)
    }
}

/// The world's worst database: the only thing it stores is tokens, but it
/// does enforce uniqueness.
#[derive(Default)]
struct TokenStore {
    allocated: Mutex<HashSet<u32>>,
}

impl TokenStore {
    fn insert(&self, token: u32) -> Result<(), UniquenessViolation> {
        let mut allocated = self.allocated.lock().unwrap();
        if allocated.insert(token) {
            Ok(())
        } else {
            Err(UniquenessViolation(token))
        }
    }
}

/// Token generator with a terrible collision rate: a scripted draw sequence
/// over only ten possible values.
struct CrappyGenerator {
    script: Mutex<std::vec::IntoIter<u32>>,
    draws: AtomicUsize,
}

impl CrappyGenerator {
    fn new(script: Vec<u32>) -> Self {
        Self {
            script: Mutex::new(script.into_iter()),
            draws: AtomicUsize::new(0),
        }
    }

    fn next(&self) -> u32 {
        self.draws.fetch_add(1, Ordering::SeqCst);
        self.script.lock().unwrap().next().expect("script exhausted")
    }
}

#[test]
fn every_user_ends_up_with_a_unique_token() {
    let store = TokenStore::default();
    // Covers all ten values, with plenty of repeats along the way.
    let generator = CrappyGenerator::new(vec![
        3, 1, 3, 1, 4, 1, 5, 9, 2, 6, 5, 3, 5, 8, 9, 7, 9, 3, 0, 2, 4, 6,
    ]);

    let collisions = Arc::new(AtomicUsize::new(0));
    let collisions_clone = collisions.clone();

    // One policy instance shared by every allocation site, so the behavior
    // is configured in one place.
    let policy = Arc::new(
        Policy::builder()
            .on(|_: &UniquenessViolation| true)
            .retry_forever()
            .on_retry(move |_e, _count, _ctx| {
                collisions_clone.fetch_add(1, Ordering::SeqCst);
            })
            .build()
            .unwrap(),
    );

    let mut tokens = Vec::new();
    for _ in 0..10 {
        let token = policy
            .execute(|| {
                let candidate = generator.next();
                store.insert(candidate)?;
                Ok(candidate)
            })
            .expect("unbounded retry only returns on success");
        tokens.push(token);
    }

    let distinct: HashSet<u32> = tokens.iter().copied().collect();
    assert_eq!(distinct.len(), 10);

    // Every draw either allocated a token or collided and was retried.
    let draws = generator.draws.load(Ordering::SeqCst);
    assert_eq!(collisions.load(Ordering::SeqCst), draws - 10);
    assert!(draws > 10, "the script should have forced collisions");
}
