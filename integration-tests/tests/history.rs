#![allow(non_snake_case)]

use cipher_loot::test_helpers::*;
use proptest::prelude::*;

#[test]
fn get_encrypted_history__offset_past_the_end__is_empty() {
    let mut ctx = TestContext::new();
    let alice = ctx.alice();

    // given
    for _ in 0..3 {
        ctx.draw_as(alice).unwrap();
    }

    // when
    let history = ctx.ledger().get_encrypted_history(&alice, 3, 10).unwrap();

    // then
    assert!(history.is_empty());
}

#[test]
fn get_encrypted_history__limit_zero__is_empty() {
    let mut ctx = TestContext::new();
    let alice = ctx.alice();
    ctx.draw_as(alice).unwrap();

    let history = ctx.ledger().get_encrypted_history(&alice, 0, 0).unwrap();

    assert!(history.is_empty());
}

#[test]
fn get_encrypted_history__huge_limit__does_not_overflow() {
    let mut ctx = TestContext::new();
    let alice = ctx.alice();

    // given
    ctx.draw_as(alice).unwrap();
    ctx.draw_as(alice).unwrap();

    // when
    let history = ctx
        .ledger()
        .get_encrypted_history(&alice, 1, u64::MAX)
        .unwrap();

    // then
    let second = ctx.ledger().get_encrypted_result(&alice, 2).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history.variants[0], second.variant);
}

#[test]
fn get_encrypted_history__is_isolated_per_player() {
    let mut ctx = TestContext::new();
    let (alice, bob) = (ctx.alice(), ctx.bob());

    // given
    let alices = ctx.draw_as(alice).unwrap();
    ctx.draw_as(bob).unwrap();

    // when
    let history = ctx.ledger().get_encrypted_history(&alice, 0, 10).unwrap();

    // then
    assert_eq!(history.rarities, vec![alices.rarity_handle]);
}

proptest! {
    #[test]
    fn get_encrypted_history__pages_cover_every_draw_once(
        draws in 1u64..15,
        page in 1u64..6,
    ) {
        // given
        let mut ctx = TestContext::new();
        let alice = ctx.alice();
        let mut expected = Vec::new();
        for _ in 0..draws {
            expected.push(ctx.draw_as(alice).unwrap().rarity_handle);
        }

        // when
        let mut collected = Vec::new();
        let mut offset = 0;
        while offset < draws {
            let history = ctx.ledger().get_encrypted_history(&alice, offset, page).unwrap();
            collected.extend(history.rarities);
            offset += page;
        }

        // then
        prop_assert_eq!(collected, expected);
    }
}
