//! Candidate expansion over an on-disk dictionary: window order, scoring,
//! deduplication, tones and the divided-window reading.

mod common;

use common::{keys, spans, Dirs, GreedySearch, BASE};
use libchinese_decoder::{
    CandidateType, DecoderConfig, DecoderError, Token, DEFAULT_LAMBDA, SCORE_SCALE,
};
use proptest::prelude::*;
use proptest::test_runner::TestRunner;

fn tokens(c: &[libchinese_decoder::Candidate]) -> Vec<Token> {
    c.iter().map(|c| c.token).collect()
}

fn unigram_score(freq: f64, total: f64) -> u32 {
    ((1.0 - DEFAULT_LAMBDA) * (freq / total) * SCORE_SCALE as f64).round() as u32
}

#[test]
fn ni_hao_without_bigram_context_ranks_by_unigram_share() -> anyhow::Result<()> {
    let dirs = Dirs::new(&BASE[..2]);
    // context 10 has statistics, but none for 11
    common::write_system_bigram(dirs.system.path(), &[(10, 12, 5)]);
    let ctx = dirs.open(DecoderConfig {
        dynamic_adjust: true,
        ..common::config()
    });

    let mut session = ctx.new_session();
    let ks = keys("ni'hao");
    session.set_keys(&ctx, ks.clone(), spans(&ks), "nihao");

    let first = session.expand_candidates(&ctx, 0)?;
    assert_eq!(tokens(&first), vec![10]);
    assert_eq!(first[0].window_len(), 1);
    assert_eq!(first[0].score, unigram_score(500.0, 800.0));

    session.guess_sentence(&ctx, &GreedySearch::default())?;
    assert_eq!(session.match_results(), &[10, 11]);
    assert_eq!(session.previous_token(&ctx, 1), 10);

    let second = session.expand_candidates(&ctx, 1)?;
    assert_eq!(tokens(&second), vec![11]);
    assert_eq!(second[0].phonetic_span, 1..2);
    assert_eq!(second[0].score, unigram_score(300.0, 800.0));
    Ok(())
}

#[test]
fn longer_windows_come_first_while_the_index_continues() -> anyhow::Result<()> {
    let dirs = Dirs::new(BASE);
    let ctx = dirs.open(common::config());
    let mut session = ctx.new_session();
    let ks = keys("ni'hao");
    session.set_keys(&ctx, ks.clone(), spans(&ks), "nihao");

    let got = session.expand_candidates(&ctx, 0)?;
    assert_eq!(tokens(&got), vec![14, 10, 13]);
    let lens: Vec<usize> = got.iter().map(|c| c.window_len()).collect();
    assert_eq!(lens, vec![2, 1, 1]);
    assert!(got[1].score > got[2].score);
    Ok(())
}

#[test]
fn descent_stops_when_nothing_extends_the_match() -> anyhow::Result<()> {
    let dirs = Dirs::new(BASE);
    let ctx = dirs.open(common::config());
    let mut session = ctx.new_session();
    let ks = keys("ni'hao'ma");
    session.set_keys(&ctx, ks.clone(), spans(&ks), "nihaoma");

    // 你好吗 matches the whole window and is not a prefix of anything longer
    assert_eq!(tokens(&session.expand_candidates(&ctx, 0)?), vec![15]);
    Ok(())
}

#[test]
fn tones_narrow_matches() -> anyhow::Result<()> {
    let dirs = Dirs::new(BASE);
    let ctx = dirs.open(common::config());
    let mut session = ctx.new_session();
    let ks = keys("ni2'hao3");
    session.set_keys(&ctx, ks.clone(), spans(&ks), "ni2hao3");
    assert_eq!(tokens(&session.expand_candidates(&ctx, 0)?), vec![13]);
    Ok(())
}

#[test]
fn repeated_pronunciations_yield_one_candidate() -> anyhow::Result<()> {
    let dirs = Dirs::new(BASE);
    let ctx = dirs.open(DecoderConfig {
        use_tone: false,
        ..common::config()
    });
    let mut session = ctx.new_session();
    let ks = keys("ni4");
    session.set_keys(&ctx, ks.clone(), spans(&ks), "ni4");
    assert_eq!(tokens(&session.expand_candidates(&ctx, 0)?), vec![10, 13]);
    Ok(())
}

#[test]
fn expansion_is_deterministic() -> anyhow::Result<()> {
    let dirs = Dirs::new(BASE);
    let ctx = dirs.open(common::config());
    let mut session = ctx.new_session();
    let ks = keys("xi'an'ni'hao");
    session.set_keys(&ctx, ks.clone(), spans(&ks), "xianihao");
    for offset in 0..=ks.len() {
        let a = session.expand_candidates(&ctx, offset)?;
        let b = session.expand_candidates(&ctx, offset)?;
        assert_eq!(a, b);
    }
    assert!(session.expand_candidates(&ctx, ks.len())?.is_empty());
    Ok(())
}

#[test]
fn divided_reading_precedes_the_single_syllable() -> anyhow::Result<()> {
    let dirs = Dirs::new(BASE);
    let ks = keys("xian1");

    let plain = dirs.open(common::config());
    let mut session = plain.new_session();
    session.set_keys(&plain, ks.clone(), spans(&ks), "xian1");
    assert_eq!(tokens(&session.expand_candidates(&plain, 0)?), vec![22]);
    plain.finalize();

    let ctx = dirs.open(DecoderConfig {
        use_divided_table: true,
        ..common::config()
    });
    let mut session = ctx.new_session();
    session.set_keys(&ctx, ks.clone(), spans(&ks), "xian1");
    let got = session.expand_candidates(&ctx, 0)?;
    assert_eq!(tokens(&got), vec![23, 22]);

    let divided = &got[0];
    assert_eq!(divided.candidate_type, CandidateType::Divided);
    assert_eq!(divided.alternate_spelling.as_deref(), Some("xi'an1"));
    assert_eq!(divided.orig_span, Some(spans(&ks)[0]));
    assert_eq!(divided.phonetic_span, 0..1);
    // the caller's keys keep their tone
    assert_eq!(session.keys()[0].tone(), 1);
    assert_eq!(got[1].candidate_type, CandidateType::Normal);
    Ok(())
}

#[test]
fn divided_tone_must_match_second_half() -> anyhow::Result<()> {
    let dirs = Dirs::new(BASE);
    let ctx = dirs.open(DecoderConfig {
        use_divided_table: true,
        ..common::config()
    });
    let mut session = ctx.new_session();
    let ks = keys("xian4");
    session.set_keys(&ctx, ks.clone(), spans(&ks), "xian4");
    // 西安 is an1 on the second syllable, so only 现 remains
    assert_eq!(tokens(&session.expand_candidates(&ctx, 0)?), vec![24]);
    Ok(())
}

#[test]
fn resplit_windows_are_unsupported() {
    let dirs = Dirs::new(BASE);
    let ctx = dirs.open(DecoderConfig {
        use_resplit_table: true,
        ..common::config()
    });
    let mut session = ctx.new_session();
    let ks = keys("ni'hao");
    session.set_keys(&ctx, ks.clone(), spans(&ks), "nihao");
    assert!(matches!(
        session.expand_candidates(&ctx, 0),
        Err(DecoderError::UnsupportedConfiguration(_))
    ));
    // a single key never reaches a two-key window
    assert!(session.expand_candidates(&ctx, 1).is_ok());
}

#[test]
fn divided_table_rejects_two_key_windows() {
    let dirs = Dirs::new(BASE);
    let ctx = dirs.open(DecoderConfig {
        use_divided_table: true,
        ..common::config()
    });
    let mut session = ctx.new_session();
    let ks = keys("xi'an");
    session.set_keys(&ctx, ks.clone(), spans(&ks), "xian");
    assert!(matches!(
        session.expand_candidates(&ctx, 0),
        Err(DecoderError::UnsupportedConfiguration("divided table"))
    ));
    // the last key alone is still expanded
    let last: Vec<Token> = tokens(&session.expand_candidates(&ctx, 1).expect("expand"));
    assert_eq!(last, vec![21]);
}

#[test]
fn candidate_lists_are_deduplicated_grouped_and_bounded() {
    let dirs = Dirs::new(BASE);
    let ctx = dirs.open(DecoderConfig {
        dynamic_adjust: true,
        ..common::config()
    });
    // a lone key may also take its divided reading
    let divided = dirs.open(DecoderConfig {
        use_divided_table: true,
        dynamic_adjust: true,
        ..common::config()
    });

    let syllable = prop::sample::select(vec!["ni", "ni3", "hao", "hao4", "ma", "xi", "an1", "xian", "xian4"]);
    let strategy = (prop::collection::vec(syllable, 1..6), 0usize..6);

    let mut runner = TestRunner::default();
    runner
        .run(&strategy, |(parts, offset)| {
            let ks = keys(&parts.join("'"));
            let ctx = if ks.len().saturating_sub(offset) < 2 { &divided } else { &ctx };
            let mut session = ctx.new_session();
            session.set_keys(ctx, ks.clone(), spans(&ks), &parts.concat());
            let got = session.expand_candidates(ctx, offset).expect("expand");

            let mut seen: Vec<Token> = tokens(&got);
            seen.sort_unstable();
            seen.dedup();
            prop_assert_eq!(seen.len(), got.len());

            for pair in got.windows(2) {
                prop_assert!(pair[0].window_len() >= pair[1].window_len());
                if pair[0].window_len() == pair[1].window_len() {
                    prop_assert!(pair[0].score >= pair[1].score);
                }
            }
            prop_assert!(got.iter().all(|c| c.score <= SCORE_SCALE));
            Ok(())
        })
        .expect("invariants hold");
}
