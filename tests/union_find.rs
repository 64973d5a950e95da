//! Tests for union_find module

use gatematch::UnionFind;

#[test]
fn test_basic_operations() {
    let mut uf: UnionFind<i32> = UnionFind::new();

    uf.make_set(1);
    uf.make_set(2);
    uf.make_set(3);

    assert!(!uf.connected(&1, &2));

    uf.union(&1, &2);
    assert!(uf.connected(&1, &2));
    assert!(!uf.connected(&1, &3));
}

#[test]
fn test_path_compression() {
    let mut uf: UnionFind<i32> = UnionFind::new();

    // Create chain: 1 -> 2 -> 3 -> 4
    uf.make_set(1);
    uf.make_set(2);
    uf.make_set(3);
    uf.make_set(4);

    uf.union(&1, &2);
    uf.union(&2, &3);
    uf.union(&3, &4);

    // After find, all should point to same root
    let root = uf.find(&1);
    assert_eq!(uf.find(&2), root);
    assert_eq!(uf.find(&3), root);
    assert_eq!(uf.find(&4), root);
}

#[test]
fn test_groups() {
    let mut uf: UnionFind<String> = UnionFind::new();

    uf.make_set("a".to_string());
    uf.make_set("b".to_string());
    uf.make_set("c".to_string());
    uf.make_set("d".to_string());

    uf.union(&"a".to_string(), &"b".to_string());
    uf.union(&"c".to_string(), &"d".to_string());

    let groups = uf.groups();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups["a"], vec!["a".to_string(), "b".to_string()]);
    assert_eq!(groups["c"], vec!["c".to_string(), "d".to_string()]);
}

#[test]
fn test_groups_deterministic() {
    // Run multiple times - results should be identical despite HashMap
    // iteration order
    let results: Vec<_> = (0..5)
        .map(|_| {
            let mut uf: UnionFind<String> = UnionFind::new();

            uf.make_set("d".to_string());
            uf.make_set("a".to_string());
            uf.make_set("c".to_string());
            uf.make_set("b".to_string());

            uf.union(&"d".to_string(), &"a".to_string());
            uf.union(&"c".to_string(), &"b".to_string());

            let mut keys: Vec<String> = uf.groups().into_keys().collect();
            keys.sort();
            keys
        })
        .collect();

    for result in &results {
        assert_eq!(result, &results[0]);
        assert_eq!(result, &vec!["a".to_string(), "b".to_string()]);
    }
}

#[test]
fn test_implicit_make_set_on_find() {
    let mut uf: UnionFind<i32> = UnionFind::new();
    assert_eq!(uf.find(&7), 7);
    assert_eq!(uf.len(), 1);
}

#[test]
fn test_union_is_idempotent() {
    let mut uf: UnionFind<i32> = UnionFind::with_capacity(2);
    uf.make_set(1);
    uf.make_set(2);

    uf.union(&1, &2);
    uf.union(&1, &2);
    uf.union(&2, &1);

    assert!(uf.connected(&1, &2));
    assert_eq!(uf.groups().len(), 1);
}
