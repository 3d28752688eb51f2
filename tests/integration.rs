//! Integration tests for the Quire layout pipeline.
//!
//! These tests run whole documents through the engine and check the
//! resulting layout tree:
//! - sizing of images and blocks against their containers
//! - floats narrowing the lines beside them
//! - relative, absolute and fixed boxes
//! - pagination, columns and forced breaks
//! - tables with spans and repeated headers
//! - JSON input

use quire::error::{DiagnosticKind, LayoutError};
use quire::layout::tree::{BlockKind, LayoutItem, LayoutTree, OffsetSource, Rect, Run};
use quire::model::*;
use quire::style::units::Unit;
use quire::style::*;

// ─── Helpers ────────────────────────────────────────────────────

const EPS: f64 = 0.01;

fn page(width: f64, height: f64, margin: f64) -> PageConfig {
    PageConfig {
        size: PageSize::Custom { width, height },
        margin: Thickness::uniform(margin),
        ..Default::default()
    }
}

fn doc_on(config: PageConfig, children: Vec<Node>) -> Document {
    let mut doc = Document::new(children);
    doc.default_page = config;
    doc
}

fn run(doc: &Document) -> LayoutTree {
    quire::layout(doc).expect("layout should succeed")
}

fn fixed(height: f64) -> Style {
    Style {
        height: Some(Unit::pt(height)),
        ..Default::default()
    }
}

fn sized(width: f64, height: f64) -> Style {
    Style {
        width: Some(Unit::pt(width)),
        height: Some(Unit::pt(height)),
        ..Default::default()
    }
}

fn block_image(pixel_width: u32, pixel_height: u32, style: Style) -> Node {
    Node::image(
        pixel_width,
        pixel_height,
        Style {
            display: Some(Display::Block),
            ..style
        },
    )
}

fn cell(col_span: u32, row_span: u32, height: f64) -> Node {
    Node::cell(col_span, row_span, Style::default(), vec![Node::block(fixed(height), vec![])])
}

fn has_diagnostic(tree: &LayoutTree, kind: DiagnosticKind) -> bool {
    tree.diagnostics.iter().any(|d| d.kind == kind)
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < EPS,
        "expected {expected}, got {actual}"
    );
}

// ─── Sizing ─────────────────────────────────────────────────────

#[test]
fn test_image_max_width_keeps_aspect_ratio() {
    let doc = doc_on(
        page(600.0, 800.0, 20.0),
        vec![block_image(
            682,
            452,
            Style {
                max_width: Some(Unit::pt(200.0)),
                ..Default::default()
            },
        )
        .named("chart")],
    );
    let tree = run(&doc);
    let image = tree.named("chart")[0];
    assert_eq!(image.kind, BlockKind::Image);
    assert_close(image.content_bounds.width, 200.0);
    assert_close(image.content_bounds.height, 339.0 * 200.0 / 511.5);
}

#[test]
fn test_percent_width_excludes_margins() {
    let doc = doc_on(
        page(640.0, 400.0, 20.0),
        vec![Node::block(
            Style {
                width: Some(Unit::percent(100.0)),
                height: Some(Unit::pt(10.0)),
                margin: Some(Thickness::symmetric(0.0, 20.0)),
                ..Default::default()
            },
            vec![],
        )
        .named("wide")],
    );
    let tree = run(&doc);
    let block = tree.named("wide")[0];
    assert_close(block.border_box().width, 560.0);
    assert_close(block.total_bounds.width, 600.0);
}

#[test]
fn test_larger_minimum_wins() {
    // 400x300px at 96ppi is 300x225pt. minWidth asks for x1.83, minHeight
    // for x1.56; the width minimum wins and the height follows it.
    let doc = doc_on(
        page(800.0, 800.0, 10.0),
        vec![block_image(
            400,
            300,
            Style {
                min_width: Some(Unit::pt(550.0)),
                min_height: Some(Unit::pt(350.0)),
                ..Default::default()
            },
        )
        .named("img")],
    );
    let tree = run(&doc);
    let image = tree.named("img")[0];
    assert_close(image.content_bounds.width, 550.0);
    assert_close(image.content_bounds.height, 412.5);
}

#[test]
fn test_minimum_scale_floor_overflows_instead_of_shrinking() {
    let doc = doc_on(
        page(300.0, 200.0, 10.0),
        vec![block_image(
            800,
            800,
            Style {
                min_scale_reduction: Some(0.5),
                ..Default::default()
            },
        )
        .named("big")],
    );
    let tree = run(&doc);
    let image = tree.named("big")[0];
    assert!(image.content_bounds.width >= 300.0 - EPS);
    assert!(image.content_bounds.height >= 300.0 - EPS);
    assert!(has_diagnostic(&tree, DiagnosticKind::OverflowBeyondBounds));
}

#[test]
fn test_image_shrinks_to_fit_above_floor() {
    // 600x600pt natural, 180pt of height available, floor 0.25 → 180x180.
    let doc = doc_on(
        page(300.0, 200.0, 10.0),
        vec![block_image(800, 800, Style::default()).named("img")],
    );
    let tree = run(&doc);
    let image = tree.named("img")[0];
    assert_close(image.content_bounds.width, 180.0);
    assert_close(image.content_bounds.height, 180.0);
    assert!(tree.diagnostics.is_empty());
}

// ─── Floats ─────────────────────────────────────────────────────

#[test]
fn test_float_narrows_lines_within_its_extent() {
    let words = "layout engines measure every word before placing it ".repeat(12);
    let doc = doc_on(
        page(300.0, 400.0, 10.0),
        vec![
            Node::block(
                Style {
                    float: Some(FloatMode::Left),
                    ..sized(100.0, 50.0)
                },
                vec![],
            )
            .named("float"),
            Node::text(&words, Style::default()),
        ],
    );
    let tree = run(&doc);
    let float = tree.named("float")[0];
    assert_eq!(float.total_bounds, Rect::new(10.0, 10.0, 100.0, 50.0));

    let lines = tree.lines(tree.pages[0].block);
    assert!(lines.len() > 5, "expected several lines, got {}", lines.len());
    let float_bottom = 60.0;
    let mut beside = 0;
    let mut below = 0;
    for line in lines {
        if line.bounds.y + EPS < float_bottom {
            assert_close(line.available_width, 180.0);
            assert!(line.bounds.x >= 110.0 - EPS);
            beside += 1;
        } else {
            assert_close(line.available_width, 280.0);
            below += 1;
        }
    }
    assert!(beside > 0 && below > 0);

    let region = &tree.block(tree.pages[0].block).regions[0];
    assert_eq!(region.floats.len(), 1);
    assert_close(region.floats[0].width, 100.0);
}

#[test]
fn test_float_beside_open_line() {
    let doc = doc_on(
        page(400.0, 400.0, 25.0),
        vec![
            Node::text("Hi", Style::default()),
            Node::block(
                Style {
                    float: Some(FloatMode::Left),
                    ..sized(50.0, 20.0)
                },
                vec![],
            )
            .named("side"),
            Node::text(" there", Style::default()),
        ],
    );
    let tree = run(&doc);
    // The line already holds text, so the float joins it at its top.
    assert_eq!(tree.named("side")[0].total_bounds, Rect::new(25.0, 25.0, 50.0, 20.0));
    let lines = tree.lines(tree.pages[0].block);
    assert_eq!(lines.len(), 1);
    assert_close(lines[0].bounds.x, 75.0);
    assert_close(lines[0].available_width, 300.0);
}

#[test]
fn test_relative_float_keeps_its_flow_space() {
    let words = "floats take width from the lines beside them ".repeat(4);
    let doc = doc_on(
        page(400.0, 400.0, 25.0),
        vec![
            Node::block(
                Style {
                    float: Some(FloatMode::Left),
                    position: Some(PositionMode::Relative),
                    top: Some(Unit::pt(20.0)),
                    left: Some(Unit::pt(10.0)),
                    ..sized(50.0, 20.0)
                },
                vec![],
            )
            .named("side"),
            Node::text(&words, Style::default()),
        ],
    );
    let tree = run(&doc);
    let side = tree.named("side")[0];
    assert_close(side.total_bounds.x, 35.0);
    assert_close(side.total_bounds.y, 45.0);

    let region = &tree.block(tree.pages[0].block).regions[0];
    assert_close(region.floats[0].inset, 0.0);
    assert_close(region.floats[0].offset_y, 0.0);
    let record = region
        .positioned
        .iter()
        .find(|p| p.block == side.id)
        .expect("relative float is recorded");
    assert_eq!(record.source, OffsetSource::Relative { dx: 10.0, dy: 20.0 });
    // Lines beside it still wrap around the unshifted float.
    assert_close(tree.lines(tree.pages[0].block)[0].bounds.x, 75.0);
}

#[test]
fn test_inline_block_sits_on_the_baseline() {
    let doc = doc_on(
        page(400.0, 400.0, 25.0),
        vec![
            Node::text("Before ", Style::default()),
            Node::block(
                Style {
                    display: Some(Display::InlineBlock),
                    ..Default::default()
                },
                vec![Node::text(
                    "Inside",
                    Style {
                        font_size: Some(Unit::pt(20.0)),
                        ..Default::default()
                    },
                )],
            )
            .named("ib"),
            Node::text(" after", Style::default()),
        ],
    );
    let tree = run(&doc);
    let outer = tree.lines(tree.pages[0].block)[0];
    let ib = tree.named("ib")[0];
    assert_eq!(ib.kind, BlockKind::InlineBlock);
    let inner = tree.lines(ib.id)[0];
    assert_close(
        outer.bounds.y + outer.baseline_offset,
        inner.bounds.y + inner.baseline_offset,
    );
    assert!(outer.bounds.height >= ib.total_bounds.height - EPS);
}

#[test]
fn test_clear_moves_block_below_float() {
    let doc = doc_on(
        page(300.0, 400.0, 10.0),
        vec![
            Node::block(
                Style {
                    float: Some(FloatMode::Right),
                    ..sized(80.0, 40.0)
                },
                vec![],
            )
            .named("float"),
            Node::block(
                Style {
                    clear: Some(Clear::Both),
                    ..fixed(10.0)
                },
                vec![],
            )
            .named("cleared"),
        ],
    );
    let tree = run(&doc);
    assert_eq!(tree.named("float")[0].total_bounds.x, 210.0);
    assert_close(tree.named("cleared")[0].total_bounds.y, 50.0);
}

// ─── Positioned boxes ───────────────────────────────────────────

#[test]
fn test_relative_offsets_shift_render_bounds_only() {
    let doc = doc_on(
        PageConfig {
            size: PageSize::Custom {
                width: 400.0,
                height: 400.0,
            },
            margin: Thickness {
                top: 25.0,
                right: 25.0,
                bottom: 25.0,
                left: 25.0,
            },
            ..Default::default()
        },
        vec![
            Node::block(fixed(60.0), vec![]),
            Node::block(
                Style {
                    position: Some(PositionMode::Relative),
                    top: Some(Unit::pt(20.0)),
                    left: Some(Unit::pt(10.0)),
                    ..fixed(40.0)
                },
                vec![],
            )
            .named("moved"),
            Node::block(fixed(10.0), vec![]).named("after"),
        ],
    );
    let tree = run(&doc);
    let moved = tree.named("moved")[0];
    assert_close(moved.total_bounds.x, 35.0);
    assert_close(moved.total_bounds.y, 105.0);
    // The flow still reserves the natural box.
    assert_close(tree.named("after")[0].total_bounds.y, 125.0);

    let region = &tree.block(tree.pages[0].block).regions[0];
    let record = region
        .positioned
        .iter()
        .find(|p| p.block == moved.id)
        .expect("relative box is recorded");
    assert_eq!(record.placeholder.y, 85.0);
    assert_eq!(record.source, OffsetSource::Relative { dx: 10.0, dy: 20.0 });
    assert!(region
        .items
        .iter()
        .any(|item| matches!(item, LayoutItem::Positioned { .. })));
}

#[test]
fn test_relative_block_image_is_shifted() {
    let doc = doc_on(
        page(400.0, 400.0, 25.0),
        vec![
            block_image(
                100,
                100,
                Style {
                    position: Some(PositionMode::Relative),
                    top: Some(Unit::pt(20.0)),
                    left: Some(Unit::pt(10.0)),
                    ..Default::default()
                },
            )
            .named("img"),
            Node::block(fixed(10.0), vec![]).named("after"),
        ],
    );
    let tree = run(&doc);
    let img = tree.named("img")[0];
    assert_close(img.content_bounds.x, 35.0);
    assert_close(img.content_bounds.y, 45.0);
    // 100px at 96ppi is 75pt; the flow keeps the natural box.
    assert_close(tree.named("after")[0].total_bounds.y, 100.0);
    let region = &tree.block(tree.pages[0].block).regions[0];
    assert!(matches!(region.items[0], LayoutItem::Positioned { .. }));
    assert_eq!(region.positioned[0].placeholder, Rect::new(25.0, 25.0, 75.0, 75.0));
}

#[test]
fn test_relative_block_text_is_shifted() {
    let doc = doc_on(
        page(400.0, 400.0, 25.0),
        vec![Node::text(
            "Shifted paragraph",
            Style {
                display: Some(Display::Block),
                position: Some(PositionMode::Relative),
                top: Some(Unit::pt(20.0)),
                left: Some(Unit::pt(10.0)),
                ..Default::default()
            },
        )
        .named("para")],
    );
    let tree = run(&doc);
    let para = tree.named("para")[0];
    let first = tree.lines(para.id)[0];
    assert_close(first.bounds.x, 35.0);
    assert_close(first.bounds.y, 45.0);
    let region = &tree.block(tree.pages[0].block).regions[0];
    assert_eq!(
        region.positioned[0].source,
        OffsetSource::Relative { dx: 10.0, dy: 20.0 }
    );
}

#[test]
fn test_inline_absolute_marks_its_line_position() {
    let doc = doc_on(
        page(400.0, 400.0, 25.0),
        vec![
            Node::text("Hello ", Style::default()),
            Node::text(
                "note",
                Style {
                    position: Some(PositionMode::Absolute),
                    ..Default::default()
                },
            )
            .named("note"),
            Node::text("world", Style::default()),
        ],
    );
    let tree = run(&doc);
    let lines = tree.lines(tree.pages[0].block);
    let line = lines[0];
    let (index, inset) = line
        .runs
        .iter()
        .find_map(|run| match run {
            Run::PositionedRegion { index, inset } => Some((*index, *inset)),
            _ => None,
        })
        .expect("line carries a positioned marker");
    assert!(inset > 0.0);

    let region = &tree.block(tree.pages[0].block).regions[0];
    let record = &region.positioned[index];
    assert_eq!(record.block, tree.named("note")[0].id);
    assert_eq!(record.source, OffsetSource::Flow);
    assert_close(record.bounds.x, line.bounds.x + inset);
    assert_close(record.bounds.y, line.bounds.y);
}

#[test]
fn test_absolute_percent_width_uses_containing_padding_box() {
    let doc = doc_on(
        page(400.0, 400.0, 25.0),
        vec![Node::block(
            Style {
                position: Some(PositionMode::Relative),
                padding: Some(Thickness::uniform(10.0)),
                ..sized(200.0, 100.0)
            },
            vec![Node::block(
                Style {
                    position: Some(PositionMode::Absolute),
                    width: Some(Unit::percent(50.0)),
                    top: Some(Unit::pt(0.0)),
                    left: Some(Unit::pt(0.0)),
                    ..fixed(10.0)
                },
                vec![],
            )
            .named("half")],
        )],
    );
    let tree = run(&doc);
    // Half of the 200pt padding box, not of the 180pt content box.
    assert_close(tree.named("half")[0].total_bounds.width, 100.0);
    assert_close(tree.named("half")[0].total_bounds.x, 25.0);
}

#[test]
fn test_absolute_resolves_against_positioned_ancestor() {
    let doc = doc_on(
        page(300.0, 200.0, 10.0),
        vec![Node::block(
            Style {
                position: Some(PositionMode::Relative),
                padding: Some(Thickness::uniform(5.0)),
                ..Default::default()
            },
            vec![Node::block(
                Style {
                    position: Some(PositionMode::Absolute),
                    top: Some(Unit::pt(10.0)),
                    left: Some(Unit::pt(20.0)),
                    ..sized(50.0, 30.0)
                },
                vec![],
            )
            .named("abs")],
        )
        .named("host")],
    );
    let tree = run(&doc);
    assert_eq!(tree.named("abs")[0].total_bounds, Rect::new(30.0, 20.0, 50.0, 30.0));
    // Out-of-flow content adds nothing to its parent's height.
    assert_close(tree.named("host")[0].total_bounds.height, 10.0);
}

#[test]
fn test_absolute_unset_axis_keeps_flow_position() {
    let doc = doc_on(
        page(300.0, 200.0, 10.0),
        vec![
            Node::block(fixed(40.0), vec![]),
            Node::block(
                Style {
                    position: Some(PositionMode::Absolute),
                    left: Some(Unit::pt(100.0)),
                    ..sized(20.0, 20.0)
                },
                vec![],
            )
            .named("abs"),
        ],
    );
    let tree = run(&doc);
    let abs = tree.named("abs")[0];
    assert_close(abs.total_bounds.x, 110.0);
    assert_close(abs.total_bounds.y, 50.0);
}

#[test]
fn test_fixed_resolves_against_page() {
    let doc = doc_on(
        page(300.0, 200.0, 10.0),
        vec![Node::block(
            Style {
                position: Some(PositionMode::Fixed),
                bottom: Some(Unit::pt(0.0)),
                right: Some(Unit::pt(0.0)),
                ..sized(50.0, 20.0)
            },
            vec![],
        )
        .named("stamp")],
    );
    let tree = run(&doc);
    assert_eq!(tree.named("stamp")[0].total_bounds, Rect::new(250.0, 180.0, 50.0, 20.0));
}

#[test]
fn test_offpage_absolute_is_dropped_under_new_page() {
    let doc = doc_on(
        page(300.0, 200.0, 10.0),
        vec![Node::block(
            Style {
                position: Some(PositionMode::Absolute),
                top: Some(Unit::pt(500.0)),
                ..sized(50.0, 20.0)
            },
            vec![],
        )
        .named("lost")],
    );
    let tree = run(&doc);
    let lost = tree.named("lost")[0];
    assert!(lost.excluded_from_output);
    let region = &tree.block(tree.pages[0].block).regions[0];
    assert_eq!(region.positioned[0].bounds, Rect::ZERO);
    assert!(has_diagnostic(&tree, DiagnosticKind::OverflowBeyondBounds));
}

#[test]
fn test_offpage_absolute_is_kept_under_clip() {
    let doc = doc_on(
        page(300.0, 200.0, 10.0),
        vec![Node::block(
            Style {
                position: Some(PositionMode::Absolute),
                top: Some(Unit::pt(500.0)),
                overflow: Some(OverflowAction::Clip),
                ..sized(50.0, 20.0)
            },
            vec![],
        )
        .named("kept")],
    );
    let tree = run(&doc);
    let kept = tree.named("kept")[0];
    assert!(!kept.excluded_from_output);
    assert_close(kept.total_bounds.y, 510.0);
    let region = &tree.block(tree.pages[0].block).regions[0];
    assert_close(region.positioned[0].bounds.y, 510.0);
}

#[test]
fn test_relative_content_truncates_in_fixed_height_box() {
    let doc = doc_on(
        page(300.0, 400.0, 10.0),
        vec![Node::block(
            fixed(50.0),
            vec![Node::block(
                Style {
                    position: Some(PositionMode::Relative),
                    ..Default::default()
                },
                vec![
                    Node::block(fixed(20.0), vec![]).named("first"),
                    Node::block(fixed(20.0), vec![]).named("second"),
                    Node::block(fixed(20.0), vec![]).named("third"),
                ],
            )],
        )
        .named("frame")],
    );
    let tree = run(&doc);
    assert_eq!(tree.pages.len(), 1);
    assert_eq!(tree.named("second").len(), 1);
    assert!(tree.named("third").is_empty());
    assert_close(tree.named("frame")[0].total_bounds.height, 50.0);
    assert!(has_diagnostic(&tree, DiagnosticKind::OverflowBeyondBounds));
}

#[test]
fn test_relative_content_follows_page_by_default() {
    let children: Vec<Node> = (0..6).map(|_| Node::block(fixed(50.0), vec![])).collect();
    let doc = doc_on(
        page(300.0, 200.0, 10.0),
        vec![Node::block(
            Style {
                position: Some(PositionMode::Relative),
                ..Default::default()
            },
            children,
        )
        .named("rel")],
    );
    let tree = run(&doc);
    assert_eq!(tree.pages.len(), 2);
    let fragments = tree.named("rel");
    assert_eq!(fragments.len(), 2);
    assert_eq!(fragments[1].page, 1);
}

#[test]
fn test_relative_truncate_option_keeps_one_page() {
    let children: Vec<Node> = (0..6).map(|_| Node::block(fixed(50.0), vec![])).collect();
    let mut doc = doc_on(
        page(300.0, 200.0, 10.0),
        vec![Node::block(
            Style {
                position: Some(PositionMode::Relative),
                ..Default::default()
            },
            children,
        )],
    );
    doc.options.relative_overflow = RelativeOverflow::Truncate;
    let tree = run(&doc);
    assert_eq!(tree.pages.len(), 1);
    assert!(has_diagnostic(&tree, DiagnosticKind::OverflowBeyondBounds));
}

// ─── Pagination ─────────────────────────────────────────────────

#[test]
fn test_page_break_and_column_break() {
    let mut config = page(300.0, 200.0, 10.0);
    config.columns = 2;
    config.alley = 20.0;
    let doc = doc_on(
        config,
        vec![
            Node::block(fixed(20.0), vec![]).named("a"),
            Node::column_break(),
            Node::block(fixed(20.0), vec![]).named("b"),
            Node::page_break(),
            Node::block(fixed(20.0), vec![]).named("c"),
        ],
    );
    let tree = run(&doc);
    assert_eq!(tree.pages.len(), 2);
    let b = tree.named("b")[0];
    assert_eq!(b.page, 0);
    assert_close(b.total_bounds.x, 160.0);
    assert_close(b.total_bounds.y, 10.0);
    let c = tree.named("c")[0];
    assert_eq!(c.page, 1);
    assert_close(c.total_bounds.x, 10.0);
}

#[test]
fn test_keep_together_moves_block_whole() {
    let doc = doc_on(
        page(300.0, 200.0, 10.0),
        vec![
            Node::block(fixed(120.0), vec![]),
            Node::block(
                Style {
                    keep_together: Some(true),
                    ..Default::default()
                },
                vec![Node::block(fixed(40.0), vec![]), Node::block(fixed(40.0), vec![])],
            )
            .named("kept"),
        ],
    );
    let tree = run(&doc);
    let kept = tree.named("kept");
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].page, 1);
    assert_close(kept[0].total_bounds.height, 80.0);
}

#[test]
fn test_block_columns_fill_in_order() {
    let doc = doc_on(
        page(300.0, 400.0, 10.0),
        vec![Node::block(
            Style {
                column_count: Some(2),
                alley_width: Some(20.0),
                ..fixed(100.0)
            },
            vec![
                Node::block(fixed(60.0), vec![]).named("one"),
                Node::block(fixed(60.0), vec![]).named("two"),
            ],
        )
        .named("cols")],
    );
    let tree = run(&doc);
    assert_eq!(tree.named("cols")[0].regions.len(), 2);
    let two = tree.named("two")[0];
    assert_close(two.total_bounds.x, 160.0);
    assert_close(two.total_bounds.y, 10.0);
}

// ─── Tables ─────────────────────────────────────────────────────

#[test]
fn test_rowspan_deficit_goes_to_last_row() {
    let table = Node::table(
        vec![],
        Style::default(),
        vec![
            Node::row(false, vec![cell(1, 3, 180.0), cell(1, 1, 50.0)]).named("r0"),
            Node::row(false, vec![cell(1, 1, 50.0)]).named("r1"),
            Node::row(false, vec![cell(1, 1, 50.0)]).named("r2"),
        ],
    );
    let tree = run(&doc_on(page(400.0, 400.0, 10.0), vec![table]));
    let heights: Vec<f64> = ["r0", "r1", "r2"]
        .iter()
        .map(|name| tree.named(name)[0].content_bounds.height)
        .collect();
    assert_eq!(heights, vec![50.0, 50.0, 80.0]);
    assert_close(heights.iter().sum(), 180.0);

    // The spanning cell is stretched over all three rows.
    let spanning = tree
        .blocks
        .iter()
        .find(|b| b.kind == BlockKind::TableCell && b.total_bounds.height > 100.0)
        .expect("spanning cell");
    assert_close(spanning.total_bounds.height, 180.0);
}

#[test]
fn test_rowspan_group_moves_as_a_unit() {
    let table = Node::table(
        vec![],
        Style::default(),
        vec![
            Node::row(false, vec![cell(1, 1, 30.0), cell(1, 1, 30.0)]).named("r0"),
            Node::row(false, vec![cell(1, 3, 90.0), cell(1, 1, 30.0)]).named("r1"),
            Node::row(false, vec![cell(1, 1, 30.0)]).named("r2"),
            Node::row(false, vec![cell(1, 1, 30.0)]).named("r3"),
        ],
    );
    let doc = doc_on(
        page(300.0, 200.0, 10.0),
        vec![Node::block(fixed(100.0), vec![]), table],
    );
    let tree = run(&doc);
    assert_eq!(tree.pages.len(), 2);
    assert_eq!(tree.named("r0")[0].page, 0);
    for name in ["r1", "r2", "r3"] {
        assert_eq!(tree.named(name)[0].page, 1, "{name} left behind");
    }
    assert_close(tree.named("r1")[0].total_bounds.y, 10.0);
}

#[test]
fn test_header_rows_repeat_on_each_page() {
    let mut rows = vec![Node::row(true, vec![cell(1, 1, 20.0), cell(1, 1, 20.0)]).named("header")];
    for _ in 0..10 {
        rows.push(Node::row(false, vec![cell(1, 1, 30.0), cell(1, 1, 30.0)]));
    }
    let table = Node::table(
        vec![
            ColumnDef {
                width: ColumnWidth::Fixed(100.0),
            },
            ColumnDef {
                width: ColumnWidth::Auto,
            },
        ],
        Style::default(),
        rows,
    );
    let tree = run(&doc_on(page(300.0, 200.0, 10.0), vec![table.named("table")]));
    assert!(tree.pages.len() >= 2);
    let headers = tree.named("header");
    assert_eq!(headers.len(), tree.pages.len());
    for (page, header) in headers.iter().enumerate() {
        assert_eq!(header.page, page);
        assert_close(header.total_bounds.y, 10.0);
    }
    assert_eq!(tree.named("table").len(), tree.pages.len());

    // Fixed column first, the auto column takes the rest.
    let first_row = headers[0];
    let cells = tree.child_blocks(first_row.id);
    assert_close(tree.block(cells[0]).total_bounds.width, 100.0);
    assert_close(tree.block(cells[1]).total_bounds.width, 180.0);
}

#[test]
fn test_oversized_span_is_clamped_and_reported() {
    let table = Node::table(
        vec![],
        Style::default(),
        vec![
            Node::row(false, vec![cell(1, 4, 20.0), cell(1, 1, 20.0)]),
            Node::row(false, vec![cell(1, 1, 20.0)]).named("last"),
        ],
    );
    let tree = run(&doc_on(page(300.0, 200.0, 10.0), vec![table]));
    assert!(has_diagnostic(&tree, DiagnosticKind::InvalidSpan));
    assert_eq!(tree.named("last").len(), 1);
}

// ─── JSON ───────────────────────────────────────────────────────

#[test]
fn test_minimal_json() {
    let tree = quire::layout_json(r#"{ "children": [] }"#).unwrap();
    assert_eq!(tree.pages.len(), 1);
}

#[test]
fn test_json_with_units_and_table() {
    let json = r#"{
        "defaultPage": {
            "size": { "Custom": { "width": 400, "height": 300 } },
            "margin": { "top": 20, "right": 20, "bottom": 20, "left": 20 }
        },
        "children": [
            {
                "kind": { "type": "Block" },
                "id": "half",
                "style": { "width": "50%", "height": "1in" }
            },
            {
                "kind": { "type": "Table", "columns": [{ "width": { "Fraction": 0.5 } }, { "width": "Auto" }] },
                "children": [
                    {
                        "kind": { "type": "TableRow", "isHeader": true },
                        "children": [
                            { "kind": { "type": "TableCell", "colSpan": 2 }, "style": { "height": "20pt" } }
                        ]
                    }
                ]
            }
        ]
    }"#;
    let tree = quire::layout_json(json).unwrap();
    let half = tree.named("half")[0];
    assert_close(half.total_bounds.width, 180.0);
    assert_close(half.total_bounds.height, 72.0);
    let table = tree.blocks.iter().find(|b| b.kind == BlockKind::Table).unwrap();
    assert_close(table.total_bounds.y, 92.0);
    assert_close(table.total_bounds.height, 20.0);
}

#[test]
fn test_invalid_json_reports_parse_error() {
    match quire::layout_json(r#"{ "children": [ }"#) {
        Err(LayoutError::Parse { hint, .. }) => assert!(!hint.is_empty()),
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn test_layout_tree_serializes() {
    let doc = doc_on(
        page(300.0, 200.0, 10.0),
        vec![Node::text("Hello, world", Style::default())],
    );
    let tree = run(&doc);
    let json = serde_json::to_string(&tree).unwrap();
    assert!(json.contains("\"pages\""));
    assert!(json.contains("\"type\":\"line\""));
    assert!(json.contains("\"type\":\"characters\""));
    assert!(!json.contains("\"Line\""));
}

#[test]
fn test_unusable_font_is_a_diagnostic() {
    let mut doc = Document::new(vec![Node::text("Hi", Style::default())]);
    doc.fonts.push(FontEntry {
        family: "Broken".into(),
        src: "not base64 at all!".into(),
        weight: 400,
        italic: false,
    });
    let tree = run(&doc);
    assert!(has_diagnostic(&tree, DiagnosticKind::Font));
}
