// tests/engine_selection.rs
//
// Selection engine behaviour end to end: filter chain, ledger and scheduler together,
// driven by an explicit clock. Local time is UTC+3 (default config).

use chrono::{DateTime, Duration, TimeZone, Utc};

use emek_relay::config::PublishConfig;
use emek_relay::engine::{Nothing, Plan, SelectOptions, SelectionEngine};
use emek_relay::scheduler::{Denial, SchedulerPhase};
use emek_relay::CandidateItem;

/// 12:00 local on 2025-03-10.
fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap()
}

fn engine_with(f: impl FnOnce(&mut PublishConfig)) -> SelectionEngine {
    let mut cfg = PublishConfig::default();
    f(&mut cfg);
    SelectionEngine::from_config(&cfg)
}

fn no_interval() -> SelectionEngine {
    engine_with(|c| c.schedule.min_interval_minutes = 0)
}

fn scenario_a() -> CandidateItem {
    CandidateItem::new(
        "Zam %25 açıklandı",
        "Memur maaşlarına yüzde 25 zam yapılacak. Zam 2025 Ocak'tan itibaren geçerli. \
         Görüşmeler tamamlandı.",
        "Memurlar.Net",
        "https://x/1",
    )
}

fn scenario_b() -> CandidateItem {
    CandidateItem::new(
        "Maaşlar belirlendi",
        "Maaşlar belirlendi. Detaylar yakında paylaşılacak.",
        "Memurlar.Net",
        "https://x/b",
    )
}

fn good(n: u32) -> CandidateItem {
    CandidateItem::new(
        format!("Kamu işçisi haberi {n}"),
        "Kamu işçilerine yüzde 15 artış uygulanacak. \
         Ödemeler 15 Nisan tarihinde hesaplara yatırılacak.",
        "Kamu Ajans",
        format!("https://x/good/{n}"),
    )
}

fn breaking() -> CandidateItem {
    CandidateItem::new(
        "SON DAKİKA: Kıdem tazminatı tavanı güncellendi",
        "Kıdem tazminatı tavanı 41 bin 828 TL oldu. \
         Düzenleme bugün yürürlüğe girdi ve 2025 Temmuz dönemini kapsıyor.",
        "Resmî Gazete",
        "https://x/breaking",
    )
}

fn opts() -> SelectOptions {
    SelectOptions::default()
}

#[test]
fn scenario_a_is_selected_and_formatted() {
    let mut e = SelectionEngine::default();
    let p = e
        .select_next(&[scenario_a()], opts(), noon())
        .expect("allowed")
        .expect("selected");

    assert!(p.post.details.len() >= 2);
    assert!(p
        .post
        .details
        .iter()
        .all(|d| d.chars().any(|c| c.is_ascii_digit())));
    assert!(p.post.text.starts_with("🟢 Zam %25 açıklandı\n\n• "));
    assert!(p.post.text.contains("• Memur maaşlarına yüzde 25 zam yapılacak"));
    assert!(p.post.text.contains("📌 Kaynak: Memurlar.Net"));
    assert!(p.post.text.ends_with("🔗 https://x/1"));
    assert!(!p.post.is_breaking);
    assert_eq!(p.daily.count, 1);
    assert_eq!(p.daily.limit, 8);
}

#[test]
fn scenario_b_shallow_only_yields_nothing() {
    let mut e = SelectionEngine::default();
    assert_eq!(
        e.plan(&[scenario_b()], opts(), noon()).unwrap(),
        Plan::Nothing(Nothing::AllFiltered {
            malformed: 0,
            duplicates: 0,
            rejected: 1
        })
    );
    assert_eq!(e.select_next(&[scenario_b()], opts(), noon()), Ok(None));
    assert_eq!(e.scheduler().state().daily_count, 0);
}

#[test]
fn shallow_item_is_skipped_for_the_next_one() {
    let mut e = SelectionEngine::default();
    let p = e
        .select_next(&[scenario_b(), scenario_a()], opts(), noon())
        .unwrap()
        .unwrap();
    assert_eq!(p.post.link, "https://x/1");
}

#[test]
fn scenario_c_cooldown_then_ready() {
    let mut e = SelectionEngine::default();
    let t0 = noon();
    assert!(e.select_next(&[good(1)], opts(), t0).unwrap().is_some());

    let denied = e
        .select_next(&[good(2)], opts(), t0 + Duration::minutes(10))
        .unwrap_err();
    assert_eq!(denied.phase(), SchedulerPhase::CoolingDown);
    assert_eq!(denied.retry_after(), Duration::minutes(20));

    let p = e
        .select_next(&[good(2)], opts(), t0 + Duration::minutes(31))
        .unwrap()
        .unwrap();
    assert_eq!(p.post.link, "https://x/good/2");
    assert_eq!(p.daily.count, 2);
}

#[test]
fn scenario_d_quota_then_rollover() {
    let mut e = engine_with(|c| {
        c.schedule.daily_limit = 2;
        c.schedule.min_interval_minutes = 0;
    });
    let t = noon();
    assert!(e.select_next(&[good(1)], opts(), t).unwrap().is_some());
    assert!(e.select_next(&[good(2)], opts(), t).unwrap().is_some());
    assert_eq!(
        e.select_next(&[good(3)], opts(), t).unwrap_err(),
        Denial::QuotaExhausted {
            daily_count: 2,
            daily_limit: 2,
            // until local midnight
            retry_after: Duration::hours(12),
        }
    );

    let next_day = t + Duration::days(1);
    let p = e.select_next(&[good(3)], opts(), next_day).unwrap().unwrap();
    assert_eq!(p.daily.count, 1);
}

#[test]
fn nothing_is_published_twice() {
    let mut e = no_interval();
    let batch = vec![good(1), good(2), scenario_a(), good(1)];
    let mut links = Vec::new();
    while let Some(p) = e.select_next(&batch, opts(), noon()).unwrap() {
        links.push(p.post.link);
    }
    assert_eq!(links, ["https://x/good/1", "https://x/good/2", "https://x/1"]);
    assert_eq!(e.ledger().len(), 3);
}

#[test]
fn second_call_with_same_batch_is_empty() {
    let mut e = no_interval();
    assert!(e.select_next(&[scenario_a()], opts(), noon()).unwrap().is_some());
    assert_eq!(e.select_next(&[scenario_a()], opts(), noon()), Ok(None));
}

#[test]
fn evicted_item_can_be_published_again() {
    let mut e = engine_with(|c| {
        c.schedule.min_interval_minutes = 0;
        c.ledger.capacity = 2;
    });
    for n in 1..=3 {
        assert!(e.select_next(&[good(n)], opts(), noon()).unwrap().is_some());
    }
    // good(1) was the oldest of three inserts into a ledger of two.
    let p = e.select_next(&[good(1)], opts(), noon()).unwrap().unwrap();
    assert_eq!(p.post.link, "https://x/good/1");
    assert_eq!(e.select_next(&[good(3)], opts(), noon()), Ok(None));
}

#[test]
fn blackout_blocks_then_clears() {
    let mut e = SelectionEngine::default();
    // 02:00 local
    let night = Utc.with_ymd_and_hms(2025, 3, 9, 23, 0, 0).unwrap();
    let d = e.select_next(&[scenario_a()], opts(), night).unwrap_err();
    assert_eq!(d.phase(), SchedulerPhase::BlackedOut);
    assert_eq!(d.retry_after(), Duration::hours(5));
    assert!(e.ledger().is_empty(), "denial must not consume candidates");

    // 07:00 local
    let morning = night + Duration::hours(5);
    assert!(e.select_next(&[scenario_a()], opts(), morning).unwrap().is_some());
}

#[test]
fn force_bypasses_rules_but_counts() {
    let mut e = engine_with(|c| c.schedule.daily_limit = 1);
    let night = Utc.with_ymd_and_hms(2025, 3, 9, 23, 0, 0).unwrap();
    let force = SelectOptions {
        force: true,
        ..Default::default()
    };
    let p = e.select_next(&[good(1)], force, night).unwrap().unwrap();
    assert_eq!(p.daily.count, 1);

    // Same local day, later: quota already used by the forced post.
    let later = night + Duration::hours(6);
    let d = e.select_next(&[good(2)], opts(), later).unwrap_err();
    assert_eq!(d.phase(), SchedulerPhase::QuotaExhausted);

    // Force again: over the limit on purpose.
    let p = e.select_next(&[good(2)], force, later).unwrap().unwrap();
    assert_eq!(p.daily.count, 2);
}

#[test]
fn prefer_breaking_changes_order_only() {
    let batch = vec![good(1), breaking()];

    let mut plain = SelectionEngine::default();
    let p = plain.select_next(&batch, opts(), noon()).unwrap().unwrap();
    assert_eq!(p.post.link, "https://x/good/1");

    let mut eager = SelectionEngine::default();
    let p = eager
        .select_next(
            &batch,
            SelectOptions {
                prefer_breaking: true,
                ..Default::default()
            },
            noon(),
        )
        .unwrap()
        .unwrap();
    assert_eq!(p.post.link, "https://x/breaking");
    assert!(p.post.is_breaking);
    assert!(p.post.text.starts_with("🔴 SON DAKİKA\n🟢 SON DAKİKA: Kıdem"));
}

#[test]
fn prefer_breaking_falls_back_to_input_order() {
    let mut e = SelectionEngine::default();
    let p = e
        .select_next(
            &[scenario_b(), good(1), good(2)],
            SelectOptions {
                prefer_breaking: true,
                ..Default::default()
            },
            noon(),
        )
        .unwrap()
        .unwrap();
    assert_eq!(p.post.link, "https://x/good/1");
}

#[test]
fn malformed_candidates_are_skipped() {
    let mut e = SelectionEngine::default();
    let mut no_link = good(1);
    no_link.link = "   ".into();
    let mut no_title = good(2);
    no_title.title = String::new();
    let p = e
        .select_next(&[no_link, no_title, good(3)], opts(), noon())
        .unwrap()
        .unwrap();
    assert_eq!(p.post.link, "https://x/good/3");
}

#[test]
fn item_marked_through_the_ledger_is_not_selected_again() {
    use emek_relay::format::PostTemplate;
    use emek_relay::ledger::PublicationLedger;
    use emek_relay::quality::QualityFilter;
    use emek_relay::scheduler::PublishScheduler;

    let mut it = good(1);
    it.title = "Kamu &amp; <b>işçi</b> zammı".into();

    let mut ledger = PublicationLedger::default();
    ledger.mark_published(&it);
    let mut e = SelectionEngine::new(
        QualityFilter::default(),
        PostTemplate::default(),
        ledger,
        PublishScheduler::default(),
    );

    assert_eq!(e.select_next(&[it.clone()], opts(), noon()), Ok(None));
    assert!(e.ledger().is_duplicate(&it));
}
