//! Pins through the session API and their use by sentence guessing.

mod common;

use common::{keys, spans, Dirs, GreedySearch, BASE};
use libchinese_decoder::{Constraint, Context, Session, SENTENCE_START};

fn session_for(ctx: &Context, text: &str) -> Session {
    let mut session = ctx.new_session();
    let ks = keys(text);
    session.set_keys(ctx, ks.clone(), spans(&ks), &text.replace('\'', ""));
    session
}

#[test]
fn pin_then_clear_leaves_nothing_to_rederive() -> anyhow::Result<()> {
    let dirs = Dirs::new(&BASE[..2]);
    let ctx = dirs.open(common::config());
    let mut session = session_for(&ctx, "ni'hao");

    assert_eq!(session.pin(&ctx, 0, 10), 1);
    assert_eq!(
        session.constraints()[0],
        Constraint::Pinned { token: 10, length: 1 }
    );

    session.clear_pin(0);
    assert_eq!(session.constraints()[0], Constraint::Unconstrained);

    session.guess_sentence(&ctx, &GreedySearch::default())?;
    assert_eq!(session.constraints()[0], Constraint::Unconstrained);
    Ok(())
}

#[test]
fn pins_chain_left_to_right() {
    let dirs = Dirs::new(BASE);
    let ctx = dirs.open(common::config());
    let mut session = session_for(&ctx, "ni'hao'xi'an");

    let next = session.pin(&ctx, 0, 14);
    assert_eq!(next, 2);
    assert_eq!(session.pin(&ctx, next, 23), 4);
    assert_eq!(
        session.constraints(),
        &[
            Constraint::Pinned { token: 14, length: 2 },
            Constraint::Covered { by: 0 },
            Constraint::Pinned { token: 23, length: 2 },
            Constraint::Covered { by: 2 },
        ]
    );

    session.clear_all_pins();
    assert!(session.constraints().iter().all(Constraint::is_unconstrained));
}

#[test]
fn rejected_pin_returns_its_offset_unchanged() {
    let dirs = Dirs::new(BASE);
    let ctx = dirs.open(common::config());
    let mut session = session_for(&ctx, "ni'hao");
    session.pin(&ctx, 1, 11);
    let before = session.constraints().to_vec();

    // 你好 needs two keys from offset 1
    assert_eq!(session.pin(&ctx, 1, 14), 1);
    assert!(session.try_pin(&ctx, 0, 22).is_err());
    assert_eq!(session.pin(&ctx, 9, 10), 9);
    assert_eq!(session.constraints(), before.as_slice());
}

#[test]
fn new_keys_drop_pins_that_no_longer_fit() {
    let dirs = Dirs::new(BASE);
    let ctx = dirs.open(common::config());
    let mut session = session_for(&ctx, "ni'hao");
    session.pin(&ctx, 0, 10);
    session.pin(&ctx, 1, 11);

    let ks = keys("ni'ma'hao");
    session.set_keys(&ctx, ks.clone(), spans(&ks), "nimahao");
    assert_eq!(
        session.constraints(),
        &[
            Constraint::Pinned { token: 10, length: 1 },
            Constraint::Unconstrained,
            Constraint::Unconstrained,
        ]
    );
}

#[test]
fn guessing_honours_pins_and_renders_the_sentence() -> anyhow::Result<()> {
    let dirs = Dirs::new(BASE);
    let ctx = dirs.open(common::config());
    let mut session = session_for(&ctx, "ni'hao");
    let search = GreedySearch::default();

    session.guess_sentence(&ctx, &search)?;
    assert_eq!(session.match_results(), &[14, 0]);
    assert_eq!(session.sentence(&ctx).as_deref(), Some("你好"));
    assert_eq!(*search.prefixes.borrow(), vec![SENTENCE_START]);

    session.pin(&ctx, 1, 12);
    session.guess_sentence(&ctx, &search)?;
    assert_eq!(session.match_results(), &[10, 12]);
    assert_eq!(session.sentence(&ctx).as_deref(), Some("你号"));
    Ok(())
}

#[test]
fn prefix_text_seeds_matching_phrases() -> anyhow::Result<()> {
    let dirs = Dirs::new(BASE);
    let ctx = dirs.open(common::config());
    let mut session = session_for(&ctx, "ma");
    let search = GreedySearch::default();

    session.guess_sentence_with_prefix(&ctx, &search, " 我说你好 ")?;
    assert_eq!(*search.prefixes.borrow(), vec![SENTENCE_START, 11, 14]);
    Ok(())
}

#[test]
fn reset_clears_the_session() -> anyhow::Result<()> {
    let dirs = Dirs::new(BASE);
    let ctx = dirs.open(common::config());
    let mut session = session_for(&ctx, "ni'hao");
    session.pin(&ctx, 0, 10);
    session.guess_sentence(&ctx, &GreedySearch::default())?;

    session.reset();
    assert!(session.keys().is_empty());
    assert!(session.constraints().is_empty());
    assert!(session.match_results().is_empty());
    assert_eq!(session.sentence(&ctx), None);
    assert!(session.expand_candidates(&ctx, 0)?.is_empty());
    ctx.free_session(session);
    Ok(())
}
