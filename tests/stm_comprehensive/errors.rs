//! Error Tests
//!
//! Usage errors, user failures and unconditional retry.

use crate::*;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn test_foreign_tvar_is_rejected() {
    let home = Context::new();
    let away = Context::new();
    let tvar = away.new_tvar(1u8);

    match atomically(&home, &read(&tvar)) {
        Err(StmError::ForeignTVar { tvar: id, owner, context }) => {
            assert_eq!(id, tvar.id());
            assert_eq!(owner, away.id());
            assert_eq!(context, home.id());
        }
        other => panic!("expected ForeignTVar, got {:?}", other),
    }
}

#[test]
fn test_foreign_write_commits_nothing() {
    let home = Context::new();
    let away = Context::new();
    let local = home.new_tvar(0i32);
    let foreign = away.new_tvar(0i32);

    let stm = write(&local, 1).then(write(&foreign, 1));
    let err = atomically(&home, &stm).unwrap_err();
    assert!(err.is_usage_error());
    assert_eq!(committed(&home, &local), 0);
    assert_eq!(committed(&away, &foreign), 0);
}

#[test]
fn test_unconditional_retry_is_starved() {
    let ctx = Context::new();
    let err = atomically(&ctx, &retry::<()>()).unwrap_err();
    assert!(err.is_starvation());
    assert_eq!(ctx.metrics().starved_retries, 1);
}

#[test]
fn test_retry_after_writes_only_is_starved() {
    let ctx = Context::new();
    let v = ctx.new_tvar(0i32);
    // The write-set alone gives nothing to wait on
    let stm = write(&v, 1).then(retry::<()>());
    assert!(atomically(&ctx, &stm).unwrap_err().is_starvation());
    assert_eq!(committed(&ctx, &v), 0);
}

#[test]
fn test_user_failure_propagates_message() {
    let ctx = Context::new();
    let v = ctx.new_tvar(3u32);
    let stm = try_bind(read(&v), move |n| {
        if n > 2 {
            anyhow::bail!("too large: {}", n);
        }
        Ok(write(&v, n + 1))
    });
    let err = atomically(&ctx, &stm).unwrap_err();
    assert!(err.is_aborted());
    assert!(err.to_string().contains("too large: 3"));
    assert_eq!(committed(&ctx, &v), 3);
    assert_eq!(ctx.metrics().aborts, 1);
}

#[test]
fn test_fail_discards_earlier_writes() {
    let ctx = Context::new();
    let v = ctx.new_tvar(String::from("before"));
    let stm = write(&v, String::from("after")).then(fail::<()>("no"));
    assert!(atomically(&ctx, &stm).unwrap_err().is_aborted());
    assert_eq!(committed(&ctx, &v), "before");
}

/// A failure observed on a torn snapshot is never reported: the attempt is
/// validated first and re-run when stale
#[test]
fn test_failure_on_stale_snapshot_is_not_reported() {
    let ctx = Context::new();
    let a = ctx.new_tvar(0u64);
    let b = ctx.new_tvar(0u64);
    let barrier = Arc::new(Barrier::new(2));

    let writer = {
        let ctx = ctx.clone();
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            let step = with_tvars(&a, &b, move |x, y| both_voided(write(&a, x + 1), write(&b, y + 1)));
            for _ in 0..2_000 {
                atomically(&ctx, &step).unwrap();
            }
        })
    };

    let check = try_bind(read(&a), move |x| {
        Ok(try_map(read(&b), move |y| {
            if x != y {
                anyhow::bail!("torn: a={} b={}", x, y);
            }
            Ok(x)
        }))
    });

    barrier.wait();
    while !writer.is_finished() {
        atomically(&ctx, &check).unwrap();
    }
    writer.join().unwrap();
    assert_eq!(atomically(&ctx, &check).unwrap(), 2_000);
}

/// User code only ever sees values committed together: with every commit
/// keeping A == B, `b - a` and `a - b` on u64 never underflow
#[test]
fn test_user_code_never_sees_torn_pair() {
    let ctx = Context::new();
    let a = ctx.new_tvar(0u64);
    let b = ctx.new_tvar(0u64);
    let barrier = Arc::new(Barrier::new(2));

    let writer = {
        let ctx = ctx.clone();
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            let step = with_tvars(&a, &b, move |x, y| both_voided(write(&a, x + 1), write(&b, y + 1)));
            for _ in 0..20_000 {
                atomically(&ctx, &step).unwrap();
            }
        })
    };

    let gap = with_tvars(&a, &b, |x, y| pure((y - x) + (x - y)));

    barrier.wait();
    while !writer.is_finished() {
        assert_eq!(atomically(&ctx, &gap).unwrap(), 0);
    }
    writer.join().unwrap();
    assert_eq!(atomically(&ctx, &gap).unwrap(), 0);
    assert_eq!(committed(&ctx, &a), 20_000);
}
