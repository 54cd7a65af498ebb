use super::*;

#[test]
fn test_empty_string_is_none() {
    let interner = ShardedInterner::new();
    assert_eq!(interner.intern(""), Atom::NONE);
    assert!(Atom::NONE.is_none());
    assert_eq!(&*interner.resolve(Atom::NONE), "");
}

#[test]
fn test_intern_is_idempotent() {
    let interner = ShardedInterner::new();
    let a = interner.intern("logger");
    let b = interner.intern("logger");
    let c = interner.intern("database");

    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_eq!(&*interner.resolve(a), "logger");
    assert_eq!(&*interner.resolve(c), "database");
}

#[test]
fn test_get_does_not_insert() {
    let interner = ShardedInterner::new();
    assert_eq!(interner.get("missing"), None);
    assert!(interner.is_empty());

    let atom = interner.intern("present");
    assert_eq!(interner.get("present"), Some(atom));
    assert_eq!(interner.len(), 2);
}

#[test]
fn test_many_names_resolve_back() {
    let interner = ShardedInterner::new();
    let atoms: Vec<_> = (0..500)
        .map(|i| interner.intern(&format!("name{i}")))
        .collect();

    for (i, atom) in atoms.iter().enumerate() {
        assert_eq!(&*interner.resolve(*atom), format!("name{i}"));
    }
    assert_eq!(interner.len(), 501);
}

#[test]
fn test_unknown_atom_resolves_to_empty() {
    let interner = ShardedInterner::new();
    assert!(interner.try_resolve(Atom(u32::MAX)).is_none());
    assert_eq!(&*interner.resolve(Atom(u32::MAX)), "");
}

#[test]
fn test_concurrent_interning_agrees() {
    let interner = std::sync::Arc::new(ShardedInterner::new());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let interner = interner.clone();
            std::thread::spawn(move || {
                (0..100)
                    .map(|i| interner.intern(&format!("shared{i}")))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let results: Vec<Vec<Atom>> = handles
        .into_iter()
        .map(|h| h.join().expect("interner thread panicked"))
        .collect();
    for other in &results[1..] {
        assert_eq!(&results[0], other);
    }
}

#[test]
fn test_poisoned_shard_keeps_interning() {
    let interner = ShardedInterner::new();
    let before = interner.intern("before");
    let shard = &interner.shards[ShardedInterner::shard_for("after")];

    std::thread::scope(|s| {
        let poisoner = s.spawn(|| {
            let _guard = shard.state.write().expect("fresh lock");
            panic!("writer died holding the shard");
        });
        assert!(poisoner.join().is_err());
    });
    assert!(shard.state.is_poisoned());

    let after = interner.intern("after");
    assert!(!after.is_none());
    assert_ne!(after, before);
    assert_eq!(&*interner.resolve(after), "after");
    assert_eq!(interner.get("after"), Some(after));
    assert_eq!(interner.intern("after"), after);
}
