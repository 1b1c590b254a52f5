//! Session bag scope resolution across the execution tree, and the
//! single-flight guarantee under sibling concurrency.

use axon_runtime::{FuncSpec, Runtime, SessionScope, SessionValue};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[tokio::test]
async fn parent_scope_fails_on_root() {
    let spec = FuncSpec::code("root_probe", "asks for a parent bag on a root")
        .build(|ctx, _args| async move {
            let result = ctx
                .get_or_put(SessionScope::Parent, "ns", "k", || async {
                    Arc::new(()) as SessionValue
                })
                .await;
            match result {
                Err(err) => Ok(json!(err.to_string())),
                Ok(_) => Ok(json!("unexpectedly succeeded")),
            }
        })
        .unwrap();

    let rt = Runtime::builder().spec(&spec).build().unwrap();
    let node = rt.get_ctx().invoke(&spec, json!({})).unwrap();
    let out = node.result().await.unwrap();
    assert_eq!(out, json!("node has no parent session"));
}

#[tokio::test]
async fn top_level_bag_shared_across_descendants() {
    let counter = Arc::new(AtomicUsize::new(0));

    // Grandchild fetches via TopLevel; so does the child; the factory must
    // run once and both must see the same instance.
    let counter_gc = counter.clone();
    let grandchild = FuncSpec::code("grandchild", "reads the top-level bag")
        .build(move |ctx, _args| {
            let counter = counter_gc.clone();
            async move {
                let value = ctx
                    .get_or_put(SessionScope::TopLevel, "ns", "k", || async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Arc::new(AtomicUsize::new(7)) as SessionValue
                    })
                    .await?;
                let n = value.downcast::<AtomicUsize>().ok().expect("stored type");
                Ok(json!(n.load(Ordering::SeqCst)))
            }
        })
        .unwrap();

    let counter_child = counter.clone();
    let grandchild_clone = grandchild.clone();
    let child = FuncSpec::code("child", "reads the bag, then spawns grandchild")
        .uses(&grandchild)
        .build(move |ctx, _args| {
            let counter = counter_child.clone();
            let spec = grandchild_clone.clone();
            async move {
                let value = ctx
                    .get_or_put(SessionScope::TopLevel, "ns", "k", || async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        Arc::new(AtomicUsize::new(7)) as SessionValue
                    })
                    .await?;
                let _ = value.downcast::<AtomicUsize>().ok().expect("stored type");
                let gc = ctx.invoke(&spec, json!({}))?;
                gc.result().await
            }
        })
        .unwrap();

    let child_clone = child.clone();
    let root = FuncSpec::code("root", "spawns the child")
        .uses(&child)
        .build(move |ctx, _args| {
            let spec = child_clone.clone();
            async move {
                let c = ctx.invoke(&spec, json!({}))?;
                c.result().await
            }
        })
        .unwrap();

    let rt = Runtime::builder().spec(&root).build().unwrap();
    let node = rt.get_ctx().invoke(&root, json!({})).unwrap();
    assert_eq!(node.result().await.unwrap(), json!(7));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn own_scope_is_per_node() {
    let counter = Arc::new(AtomicUsize::new(0));

    let counter_clone = counter.clone();
    let worker = FuncSpec::code("worker", "populates its own bag")
        .build(move |ctx, _args| {
            let counter = counter_clone.clone();
            async move {
                ctx.get_or_put(SessionScope::Own, "ns", "k", || async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Arc::new(()) as SessionValue
                })
                .await?;
                Ok(json!(null))
            }
        })
        .unwrap();

    let rt = Runtime::builder().spec(&worker).build().unwrap();
    // Two roots, two distinct bags: the factory runs once per node.
    let a = rt.get_ctx().invoke(&worker, json!({})).unwrap();
    let b = rt.get_ctx().invoke(&worker, json!({})).unwrap();
    a.result().await.unwrap();
    b.result().await.unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn single_flight_across_parallel_siblings() {
    let counter = Arc::new(AtomicUsize::new(0));

    let counter_clone = counter.clone();
    let sibling = FuncSpec::code("sibling", "races on the top-level bag")
        .build(move |ctx, _args| {
            let counter = counter_clone.clone();
            async move {
                let value = ctx
                    .get_or_put(SessionScope::TopLevel, "ns", "k", || async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                        Arc::new(AtomicUsize::new(0)) as SessionValue
                    })
                    .await?;
                // Report the instance's address so the parent can compare
                // identities across siblings.
                Ok(json!(format!("{:p}", Arc::as_ptr(&value))))
            }
        })
        .unwrap();

    let sibling_clone = sibling.clone();
    let parent = FuncSpec::code("parent", "spawns racing siblings")
        .uses(&sibling)
        .build(move |ctx, _args| {
            let spec = sibling_clone.clone();
            async move {
                let children: Vec<_> = (0..16)
                    .map(|_| ctx.invoke(&spec, json!({})))
                    .collect::<Result<_, _>>()?;
                let mut addrs = Vec::new();
                for child in children {
                    addrs.push(child.result().await?);
                }
                Ok(json!(addrs))
            }
        })
        .unwrap();

    let rt = Runtime::builder().spec(&parent).build().unwrap();
    let node = rt.get_ctx().invoke(&parent, json!({})).unwrap();
    let addrs = node.result().await.unwrap();
    let addrs = addrs.as_array().unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(addrs.iter().all(|a| a == &addrs[0]));
}

#[tokio::test]
async fn parent_scope_resolves_to_immediate_parent() {
    // The child stores into its Parent scope; the parent then finds the
    // value in its Own scope.
    let child = FuncSpec::code("child", "writes into the parent's bag")
        .build(|ctx, _args| async move {
            ctx.get_or_put(SessionScope::Parent, "ns", "marker", || async {
                Arc::new(41_u32) as SessionValue
            })
            .await?;
            Ok(json!(null))
        })
        .unwrap();

    let child_clone = child.clone();
    let parent = FuncSpec::code("parent", "reads what the child stored")
        .uses(&child)
        .build(move |ctx, _args| {
            let spec = child_clone.clone();
            async move {
                let c = ctx.invoke(&spec, json!({}))?;
                c.result().await?;
                let value = ctx
                    .get_or_put(SessionScope::Own, "ns", "marker", || async {
                        Arc::new(0_u32) as SessionValue
                    })
                    .await?;
                let n = value.downcast::<u32>().ok().expect("stored type");
                Ok(json!(*n))
            }
        })
        .unwrap();

    let rt = Runtime::builder().spec(&parent).build().unwrap();
    let node = rt.get_ctx().invoke(&parent, json!({})).unwrap();
    // The child's factory ran first, so the parent sees 41, not 0.
    assert_eq!(node.result().await.unwrap(), json!(41));
}
