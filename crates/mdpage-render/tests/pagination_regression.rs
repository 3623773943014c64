mod common;

use common::{all_runs, Call, SpyCanvas};
use mdpage_render::{
    CanvasError, DrawCommand, FontFace, LayoutConfig, RenderEngine, RenderEngineOptions,
    RenderError,
};

const EPS: f32 = 0.001;

fn sections(count: usize) -> String {
    (1..=count)
        .map(|n| format!("# Section {n}\n\nBody text\n"))
        .collect()
}

#[test]
fn heading_and_bold_tail_render_with_expected_fonts() {
    let doc = RenderEngine::default()
        .render("# Title\n\nHello **world**")
        .unwrap();
    assert_eq!(doc.pages().len(), 1);
    let runs = all_runs(doc.pages());
    assert_eq!(runs.len(), 3);

    assert_eq!(runs[0].text, "Title");
    assert_eq!(runs[0].style.face, FontFace::Bold);
    assert_eq!(runs[0].style.size_pt, 24.0);
    assert!(!runs[0].continued);

    assert_eq!(runs[1].text, "Hello ");
    assert_eq!(runs[1].style.face, FontFace::Normal);
    assert_eq!(runs[1].style.size_pt, 12.0);
    assert!(runs[1].continued);

    assert_eq!(runs[2].text, "world");
    assert_eq!(runs[2].style.face, FontFace::Bold);
    assert_eq!(runs[2].style.size_pt, 12.0);
    assert!(!runs[2].continued);
    assert_eq!(runs[1].baseline_y, runs[2].baseline_y);
}

#[test]
fn long_document_paginates_without_splitting_headings() {
    let doc = RenderEngine::default().render(&sections(200)).unwrap();
    let pages = doc.pages();
    assert!(pages.len() > 1);
    assert_eq!(doc.summary.blocks, 400);
    assert_eq!(doc.summary.pages, pages.len());
    assert_eq!(doc.summary.page_breaks, pages.len() - 1);

    let cfg = LayoutConfig::default();
    let mut expected = 1usize;
    for page in pages {
        assert!(!page.metrics.overflowed);
        for run in page.text_runs() {
            assert!(run.baseline_y > cfg.margin_top);
            assert!(run.baseline_y < cfg.content_bottom());
            if run.style.face == FontFace::Bold {
                assert_eq!(run.text, format!("Section {expected}"));
                assert!(!run.continued);
                expected += 1;
            }
        }
    }
    assert_eq!(expected, 201);
}

#[test]
fn lone_rule_is_drawn_at_top_margin() {
    let doc = RenderEngine::default().render("---").unwrap();
    assert_eq!(doc.pages().len(), 1);
    let page = &doc.pages()[0];
    assert_eq!(page.content_commands.len(), 1);
    match &page.content_commands[0] {
        DrawCommand::Rule(rule) => {
            assert_eq!(rule.y1, 50.0);
            assert_eq!(rule.y2, 50.0);
            assert_eq!(rule.x1, 50.0);
            assert_eq!(rule.x2, 562.0);
        }
        other => panic!("expected rule, got {other:?}"),
    }
}

#[test]
fn empty_input_renders_one_blank_page() {
    let doc = RenderEngine::default().render("").unwrap();
    assert_eq!(doc.pages().len(), 1);
    assert!(doc.pages()[0].is_blank());
    assert_eq!(doc.summary.blocks, 0);
}

#[test]
fn ordered_list_numbers_continue_from_start() {
    let doc = RenderEngine::default()
        .render("3. three\n4. four\n5. five\n")
        .unwrap();
    let texts: Vec<&str> = all_runs(doc.pages())
        .iter()
        .map(|r| r.text.as_str())
        .collect();
    assert_eq!(texts, vec!["3. three", "4. four", "5. five"]);
}

#[test]
fn unordered_items_get_bullets_and_nested_items_flatten() {
    let doc = RenderEngine::default()
        .render("- outer\n  - inner\n- last\n")
        .unwrap();
    let texts: Vec<&str> = all_runs(doc.pages())
        .iter()
        .map(|r| r.text.as_str())
        .collect();
    assert_eq!(
        texts,
        vec!["\u{2022} outer", "\u{2022} inner", "\u{2022} last"]
    );
}

#[test]
fn cursor_is_monotonic_within_a_page_and_resets_on_new_page() {
    let (spy, log) = SpyCanvas::new(LayoutConfig::default());
    let mut markdown = sections(60);
    markdown.push_str("\n---\n\n```\ncode\n```\n\n- a\n- b\n");
    RenderEngine::default().render_into(&markdown, spy).unwrap();

    let log = log.borrow();
    assert!(log.finalized);
    let mut prev = (1usize, 50.0f32);
    let mut saw_new_page = false;
    for (call, &(page, y)) in log.calls.iter().zip(log.cursor.iter()) {
        if page == prev.0 {
            assert!(y + EPS >= prev.1, "cursor moved up on page {page}");
        } else {
            assert!(page > prev.0);
        }
        if *call == Call::AddPage {
            assert_eq!(y, 50.0);
            saw_new_page = true;
        }
        prev = (page, y);
    }
    assert!(saw_new_page);
}

#[test]
fn normal_face_is_restored_after_every_block() {
    let (spy, log) = SpyCanvas::new(LayoutConfig::default());
    let markdown = "# Head\n\nends **bold**\n\nnext para\n\n- **item** x\n\n```\nx\n```\n\nafter code\n";
    RenderEngine::default().render_into(markdown, spy).unwrap();

    let log = log.borrow();
    let mut face = FontFace::Normal;
    for call in &log.calls {
        match call {
            Call::SetFont(f, _) => face = *f,
            Call::MoveDown(_) => assert_eq!(face, FontFace::Normal),
            Call::DrawText { text, face, .. } if text == "next para" || text == "after code" => {
                assert_eq!(*face, FontFace::Normal)
            }
            _ => {}
        }
    }
}

#[test]
fn rule_uses_cursor_from_before_the_block() {
    let (spy, log) = SpyCanvas::new(LayoutConfig::default());
    RenderEngine::default()
        .render_into("para\n\n---\n\nafter", spy)
        .unwrap();
    let log = log.borrow();
    let line_at = log
        .calls
        .iter()
        .position(|c| matches!(c, Call::DrawLine { .. }))
        .unwrap();
    let Call::DrawLine { y } = log.calls[line_at] else {
        unreachable!()
    };
    // Cursor after the paragraph's trailing gap.
    assert_eq!(log.cursor[line_at - 1].1, y);
    assert_eq!(log.cursor[line_at].1, y);
}

#[test]
fn canvas_failure_aborts_and_propagates() {
    let (spy, log) = SpyCanvas::failing_on_draw(LayoutConfig::default(), 3);
    let err = RenderEngine::default()
        .render_into("# one\n\ntwo\n\nthree\n\nfour", spy)
        .unwrap_err();
    assert!(matches!(err, RenderError::RenderFailure(CanvasError::Closed)));
    assert!(!err.is_client_error());
    let log = log.borrow();
    assert!(log.aborted);
    assert!(!log.finalized);
    let drawn = log
        .calls
        .iter()
        .filter(|c| matches!(c, Call::DrawText { .. }))
        .count();
    assert_eq!(drawn, 2);
}

#[test]
fn malformed_document_draws_nothing() {
    let (spy, log) = SpyCanvas::new(LayoutConfig::default());
    let err = RenderEngine::default()
        .render_into("# ok\n\nbad\0byte", spy)
        .unwrap_err();
    assert!(err.is_client_error());
    let log = log.borrow();
    assert!(log.aborted);
    assert!(log.calls.is_empty());
}

#[test]
fn tall_paragraph_flows_across_pages() {
    let long = "word ".repeat(3000);
    let doc = RenderEngine::default().render(&long).unwrap();
    assert!(doc.pages().len() > 1);
    assert!(doc.pages().iter().all(|p| !p.metrics.overflowed));
    assert_eq!(doc.summary.page_breaks, 0);
}

#[test]
fn tall_paragraph_overflows_when_flow_is_disabled() {
    let mut opts = RenderEngineOptions::default();
    opts.layout.flow_overflow = false;
    let long = "word ".repeat(3000);
    let doc = RenderEngine::new(opts).render(&long).unwrap();
    assert_eq!(doc.pages().len(), 1);
    assert!(doc.pages()[0].metrics.overflowed);
}

#[test]
fn page_numbers_are_optional_chrome() {
    let mut opts = RenderEngineOptions::default();
    opts.layout.page_numbers = true;
    let doc = RenderEngine::new(opts).render(&sections(100)).unwrap();
    for page in doc.pages() {
        let label = page.chrome_commands[0].as_text().unwrap();
        assert_eq!(label.text, page.page_number.to_string());
    }
}

fn faces(markdown: &str) -> Vec<(String, FontFace)> {
    let doc = RenderEngine::default().render(markdown).unwrap();
    all_runs(doc.pages())
        .iter()
        .map(|run| (run.text.clone(), run.style.face))
        .collect()
}

#[test]
fn inline_code_with_stars_renders_literally() {
    assert_eq!(
        faces("use `a**b**c` now"),
        vec![("use a**b**c now".to_string(), FontFace::Normal)]
    );
}

#[test]
fn escaped_stars_render_literally() {
    assert_eq!(
        faces(r"not \*\*bold\*\* here"),
        vec![("not **bold** here".to_string(), FontFace::Normal)]
    );
    assert_eq!(
        faces(r"keep \*\*this\*\* and **that**"),
        vec![
            ("keep **this** and ".to_string(), FontFace::Normal),
            ("that".to_string(), FontFace::Bold)
        ]
    );
}

#[test]
fn oversized_safety_margin_keeps_first_page_in_use() {
    let mut opts = RenderEngineOptions::default();
    opts.blocks.safety_margin_pt = 800.0;
    let doc = RenderEngine::new(opts).render("a\n\nb\n\nc").unwrap();
    let blank: Vec<bool> = doc.pages().iter().map(|page| page.is_blank()).collect();
    assert_eq!(blank, vec![false, false, false]);
    assert_eq!(doc.summary.page_breaks, 2);
}
