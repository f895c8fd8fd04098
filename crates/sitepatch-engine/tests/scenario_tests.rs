//! Engine-level scenarios
//!
//! Each test drives the public API the way a pipeline step does.

use pretty_assertions::assert_eq;
use sitepatch_engine::prelude::*;
use sitepatch_engine::{RegionOutcome, Region, SentinelSyntax};

const PAGE: &str = r#"<!doctype html>
<html>
<body>
  <section class="hero"><h1>Case vacanza</h1></section>
  <div class="cards" id="propertyGrid">
    <article class="card">Villa</article>
  </div>
</body>
</html>
"#;

fn name(s: &str) -> MarkerName {
    MarkerName::new(s).unwrap()
}

fn cards() -> Anchor {
    Anchor::element_with_class("div", "cards").unwrap()
}

#[test]
fn test_inject_before_anchor_is_repeatable() {
    let registry = MarkerRegistry::new(ArtifactKind::Markup).with_anchor(cards());
    let injector = BlockInjector::new(&registry);

    let first = injector.inject(PAGE, &name("BAR:V1"), r#"<div id="bar">x</div>"#, &cards());
    let bar = first.text.find(r#"<div id="bar">x</div>"#).unwrap();
    let anchor = cards().find_first(&first.text).unwrap();
    assert!(bar < anchor.start());
    assert_eq!(
        &first.text[bar..anchor.start()],
        "<div id=\"bar\">x</div>\n  "
    );

    let second = injector.inject(&first.text, &name("BAR:V1"), r#"<div id="bar">x</div>"#, &cards());
    assert_eq!(second.outcome, InjectOutcome::AlreadyPresent);
    assert_eq!(second.text, first.text);
}

#[test]
fn test_generation_succession() {
    let mut registry = MarkerRegistry::new(ArtifactKind::Markup).with_anchor(cards());
    registry.register_all([name("BAR:V1"), name("BAR:V2")]);

    let v1 = BlockInjector::new(&registry)
        .inject(PAGE, &name("BAR:V1"), r#"<div id="bar">v1</div>"#, &cards())
        .text;

    let migrated = LegacyMigrator::new(&registry).strip_legacy(&v1, &[name("BAR:V1")], &[]);
    assert_eq!(migrated.text, PAGE);

    let v2 = BlockInjector::new(&registry)
        .inject(&migrated.text, &name("BAR:V2"), r#"<div id="bar">v2</div>"#, &cards())
        .text;
    assert!(registry.find_blocks(&v2, &name("BAR:V1")).is_empty());
    assert_eq!(registry.find_blocks(&v2, &name("BAR:V2")).len(), 1);
    assert!(!v2.contains("v1"));
}

#[test]
fn test_stylesheet_append_twice_keeps_one_copy() {
    let registry = MarkerRegistry::new(ArtifactKind::Stylesheet);
    let injector = BlockInjector::new(&registry).with_terminator(Terminator::Explicit);
    let css = ".card { border-radius: 12px; }\n";

    let first = injector.append(css, &name("BAR:CSS"), ".bar { display: flex; }");
    let second = injector.append(&first.text, &name("BAR:CSS"), ".bar { display: flex; }");
    assert_eq!(second.text, first.text);
    assert_eq!(second.text.matches(".bar { display: flex; }").count(), 1);
}

#[test]
fn test_missing_anchor_appends_and_reports() {
    let registry = MarkerRegistry::new(ArtifactKind::Markup);
    let html = "<html><body><p>no grid</p></body></html>\n";
    let injection = BlockInjector::new(&registry).inject(html, &name("BAR:V1"), "<nav></nav>", &cards());

    assert_eq!(injection.outcome, InjectOutcome::Appended);
    assert!(injection.text.ends_with("<!-- BAR:V1 -->\n<nav></nav>\n"));
    assert_eq!(injection.diagnostics.len(), 1);
    assert_eq!(injection.diagnostics[0].kind, DiagnosticKind::AnchorNotFound);
}

#[test]
fn test_pre_marker_fragment_removed_by_fingerprint() {
    let mut registry = MarkerRegistry::new(ArtifactKind::Markup).with_anchor(cards());
    registry.register_all([name("BAR:V2")]);
    let legacy = PAGE.replace(
        "  <div class=\"cards\"",
        "  <div class=\"miniFilters\"><button>Tutte</button></div>\n  <div class=\"cards\"",
    );

    let fingerprint = Fingerprint::element_class(Some("div"), "miniFilters").unwrap();
    let migrated = LegacyMigrator::new(&registry).strip_legacy(&legacy, &[], &[fingerprint]);
    assert_eq!(migrated.text, PAGE);
    assert_eq!(migrated.removed, 1);
}

#[test]
fn test_region_claims_hand_written_cards_then_regenerates() {
    let syntax = SentinelSyntax::for_kind(ArtifactKind::Markup);
    let region = Region::new(name("AUTO_CARDS_START"), name("AUTO_CARDS_END"));
    let cards_body = "<article class=\"card\">Villa</article>\n<article class=\"card\">Atena</article>";

    let first = region.replace(&syntax, PAGE, cards_body, Some(&cards())).unwrap();
    assert_eq!(first.outcome, RegionOutcome::Claimed);
    assert_eq!(first.text.matches("Villa").count(), 1);
    assert_eq!(first.text.matches("<article").count(), 2);
    assert!(first.text.contains(
        "<div class=\"cards\" id=\"propertyGrid\">\n<!-- AUTO_CARDS_START -->\n<article class=\"card\">Villa</article>"
    ));

    let rerun = region.replace(&syntax, &first.text, cards_body, Some(&cards())).unwrap();
    assert_eq!(rerun.outcome, RegionOutcome::Unchanged);
    assert_eq!(rerun.text, first.text);

    let second = region.replace(&syntax, &first.text, "<article>Two</article>", Some(&cards())).unwrap();
    assert_eq!(second.outcome, RegionOutcome::Replaced);
    assert!(second.text.contains("<!-- AUTO_CARDS_START -->\n<article>Two</article>\n<!-- AUTO_CARDS_END -->"));
    assert!(!second.text.contains("Villa"));
}

#[test]
fn test_region_inserted_before_non_element_anchor() {
    let syntax = SentinelSyntax::for_kind(ArtifactKind::Markup);
    let region = Region::new(name("AUTO_CARDS_START"), name("AUTO_CARDS_END"));
    let anchor = Anchor::closing_tag("body").unwrap();

    let first = region.replace(&syntax, PAGE, "<article>One</article>", Some(&anchor)).unwrap();
    assert_eq!(first.outcome, RegionOutcome::Inserted);
    assert!(first.text.contains("<!-- AUTO_CARDS_END -->\n</body>"));
    assert!(first.text.contains("Villa"));
}
