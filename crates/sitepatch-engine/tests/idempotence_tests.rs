use proptest::prelude::*;
use sitepatch_engine::prelude::*;

const FRAGMENTS: &[&str] = &[
    "<p>listing text</p>\n",
    "<!-- hero section -->\n",
    "<!-- BAR:V1 -->\n<div id=\"bar\">old</div>\n",
    "<!-- BAR:V2 -->\n<div id=\"bar\">new</div>\n",
    "<div class=\"cards\"></div>\n",
    "<div id=\"caseBar\"><button>Filtri</button></div>\n",
    "<section class=\"promo\">old promo</section>\n",
    "<div class=\"promo\">x</div>\n",
    "<!-- bar:v1 -->\n<div id=\"bar\">lowercase</div>\n",
];

fn name(s: &str) -> MarkerName {
    MarkerName::new(s).unwrap()
}

fn registry() -> MarkerRegistry {
    let mut registry = MarkerRegistry::new(ArtifactKind::Markup)
        .with_anchor(Anchor::element_with_class("div", "cards").unwrap());
    registry.register_all([name("BAR:V1"), name("BAR:V2")]);
    registry
}

fn apply(registry: &MarkerRegistry, text: &str) -> (String, Vec<Diagnostic>) {
    let anchor = &registry.anchors()[0];
    let fingerprints = [
        Fingerprint::element_id(Some("div"), "caseBar").unwrap(),
        Fingerprint::element_class(None, "promo").unwrap(),
    ];
    let migrator = LegacyMigrator::new(registry);

    let stripped = migrator.strip_legacy(text, &[name("BAR:V1")], &fingerprints);
    let deduped = migrator.dedupe_current(&stripped.text, &name("BAR:V2"), Some(anchor));
    let text = BlockInjector::new(registry)
        .inject(&deduped.text, &name("BAR:V2"), "<div id=\"bar\">new</div>", anchor)
        .text;
    (text, stripped.diagnostics)
}

fn ambiguous(diagnostics: &[Diagnostic]) -> usize {
    diagnostics
        .iter()
        .filter(|d| d.kind == DiagnosticKind::AmbiguousLegacyMatch)
        .count()
}

fn document() -> impl Strategy<Value = String> {
    proptest::collection::vec(0..FRAGMENTS.len(), 0..12)
        .prop_map(|picks| picks.into_iter().map(|i| FRAGMENTS[i]).collect())
}

fn count_starts(registry: &MarkerRegistry, text: &str, marker: &str) -> usize {
    registry
        .syntax()
        .scan(text)
        .iter()
        .filter(|t| t.opens(&name(marker)))
        .count()
}

proptest! {
    #![proptest_config(ProptestConfig { max_global_rejects: 8192, ..ProptestConfig::default() })]

    #[test]
    fn prop_apply_is_idempotent(doc in document()) {
        let registry = registry();
        let (once, _) = apply(&registry, &doc);
        let (twice, _) = apply(&registry, &once);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_ambiguity_is_reported_on_every_run(doc in document()) {
        let registry = registry();
        let (once, first) = apply(&registry, &doc);
        let (_, second) = apply(&registry, &once);
        prop_assert_eq!(ambiguous(&first), ambiguous(&second));
    }

    #[test]
    fn prop_at_most_one_current_marker(doc in document()) {
        let registry = registry();
        let (out, _) = apply(&registry, &doc);
        prop_assert_eq!(count_starts(&registry, &out, "BAR:V2"), 1);
    }

    #[test]
    fn prop_legacy_migration_is_complete(doc in document()) {
        let registry = registry();
        let (out, _) = apply(&registry, &doc);
        prop_assert_eq!(count_starts(&registry, &out, "BAR:V1"), 0);
    }

    #[test]
    fn prop_injected_block_precedes_anchor(doc in document()) {
        let registry = registry();
        prop_assume!(!doc.contains("BAR:V2") && doc.contains("class=\"cards\""));
        let (out, _) = apply(&registry, &doc);
        let block = registry.find_block(&out, &name("BAR:V2")).unwrap();
        let anchor = registry.anchors()[0].find_first(&out).unwrap();
        prop_assert!(block.end() <= anchor.start());
    }

    #[test]
    fn prop_anchors_survive(doc in document()) {
        let registry = registry();
        let (out, _) = apply(&registry, &doc);
        prop_assert_eq!(
            out.matches("<div class=\"cards\">").count(),
            doc.matches("<div class=\"cards\">").count()
        );
    }
}

#[test]
fn mixed_shape_fingerprint_is_stable_across_runs() {
    let registry = registry();
    let doc = "<section class=\"promo\">long content here</section>\n<div class=\"promo\">x</div>\n<p>keep</p>\n<div class=\"cards\"></div>\n";

    let (once, first) = apply(&registry, doc);
    let (twice, second) = apply(&registry, &once);
    assert_eq!(twice, once);
    assert_eq!(second, first);
    assert_eq!(ambiguous(&first), 1);
    assert!(once.contains("<section class=\"promo\">long content here</section>"));
    assert!(once.contains("<div class=\"promo\">x</div>"));
}
