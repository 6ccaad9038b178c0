mod common;

use common::fixtures::{
    block, body_blocks, document, engine, fixed_block, line_text, lines, para, recording_engine,
    single_master,
};
use fo_stream::{
    AbsolutePosition, BlockTraits, CellTraits, ColumnWidth, ContainerTraits, FoKind,
    GraphicTraits, ListTraits, Overflow, PageSequenceTraits, TableTraits,
};
use fo_stream_layout::{InlineArea, LayoutConfig, LayoutDiagnostic, Positioning};

fn seq() -> PageSequenceTraits {
    PageSequenceTraits::new("page")
}

#[test]
fn list_item_places_label_and_body_side_by_side() {
    let tree = document(single_master(100_000, 100_000), seq(), |b| {
        b.start(FoKind::ListBlock(ListTraits::default())).unwrap();
        b.start(FoKind::ListItem(BlockTraits::default())).unwrap();
        b.start(FoKind::ListItemLabel).unwrap();
        para(b, "1.");
        b.end().unwrap();
        b.start(FoKind::ListItemBody).unwrap();
        para(b, "first item");
        b.end().unwrap();
        b.end().unwrap();
        b.end().unwrap();
    });
    let pages = engine().layout(&tree).unwrap();
    let list = block(&body_blocks(&pages[0])[0]);
    let item = block(&list.children[0]);
    assert_eq!(item.children.len(), 2);
    let label = block(&item.children[0]);
    let body = block(&item.children[1]);
    assert_eq!((label.x, label.width), (0, 18_000));
    assert_eq!((body.x, body.width), (24_000, 76_000));
    assert_eq!(line_text(lines(&label.children)[0]), "1.");
    assert_eq!(line_text(lines(&body.children)[0]), "first item");
    assert_eq!(item.height, 14_400);
}

#[test]
fn list_items_stack_in_order() {
    let tree = document(single_master(100_000, 100_000), seq(), |b| {
        b.start(FoKind::ListBlock(ListTraits::default())).unwrap();
        for n in 1..=3 {
            b.start(FoKind::ListItem(BlockTraits::default())).unwrap();
            b.start(FoKind::ListItemLabel).unwrap();
            para(b, &format!("{n}."));
            b.end().unwrap();
            b.start(FoKind::ListItemBody).unwrap();
            para(b, "entry");
            b.end().unwrap();
            b.end().unwrap();
        }
        b.end().unwrap();
    });
    let pages = engine().layout(&tree).unwrap();
    let list = block(&body_blocks(&pages[0])[0]);
    let ys: Vec<_> = list.children.iter().map(|c| block(c).y).collect();
    assert_eq!(ys, [0, 14_400, 28_800]);
    assert_eq!(list.height, 3 * 14_400);
}

#[test]
fn table_cells_follow_column_widths_and_share_row_height() {
    let table = TableTraits {
        columns: vec![ColumnWidth::Proportional(1), ColumnWidth::Proportional(1)],
        ..TableTraits::default()
    };
    let tree = document(single_master(40_000, 100_000), seq(), |b| {
        b.start(FoKind::Table(table)).unwrap();
        b.start(FoKind::TableRow).unwrap();
        b.start(FoKind::TableCell(CellTraits::default())).unwrap();
        para(b, "a");
        b.end().unwrap();
        b.start(FoKind::TableCell(CellTraits::default())).unwrap();
        para(b, "aaaaaaaaaa bbbbbbbbbb");
        b.end().unwrap();
        b.end().unwrap();
        b.end().unwrap();
    });
    let pages = engine().layout(&tree).unwrap();
    let table = block(&body_blocks(&pages[0])[0]);
    let row = block(&table.children[0]);
    let cells: Vec<_> = row.children.iter().map(block).collect();
    assert_eq!(cells.len(), 2);
    assert_eq!((cells[0].x, cells[0].width), (0, 20_000));
    assert_eq!((cells[1].x, cells[1].width), (20_000, 20_000));
    assert_eq!(lines(&cells[1].children).len(), 2);
    assert_eq!(cells[0].height, 28_800);
    assert_eq!(cells[1].height, 28_800);
    assert_eq!(row.height, 28_800);
}

#[test]
fn spanning_cell_covers_two_columns() {
    let tree = document(single_master(30_000, 100_000), seq(), |b| {
        b.start(FoKind::Table(TableTraits::default())).unwrap();
        for spans in [[1u32, 1, 1].as_slice(), [2, 1].as_slice()] {
            b.start(FoKind::TableRow).unwrap();
            for span in spans {
                b.start(FoKind::TableCell(CellTraits {
                    columns_spanned: *span,
                    ..CellTraits::default()
                }))
                .unwrap();
                para(b, "x");
                b.end().unwrap();
            }
            b.end().unwrap();
        }
        b.end().unwrap();
    });
    let pages = engine().layout(&tree).unwrap();
    let table = block(&body_blocks(&pages[0])[0]);
    let second = block(&table.children[1]);
    let cells: Vec<_> = second.children.iter().map(block).collect();
    assert_eq!((cells[0].x, cells[0].width), (0, 20_000));
    assert_eq!((cells[1].x, cells[1].width), (20_000, 10_000));
}

#[test]
fn absolute_container_takes_no_flow_space() {
    let tree = document(single_master(50_000, 50_000), seq(), |b| {
        b.start(FoKind::BlockContainer(ContainerTraits {
            position: AbsolutePosition::Absolute,
            top: 5_000,
            left: 6_000,
            width: Some(10_000),
            height: Some(10_000),
            ..ContainerTraits::default()
        }))
        .unwrap();
        para(b, "boxed");
        b.end().unwrap();
        fixed_block(b, 10_000);
    });
    let pages = engine().layout(&tree).unwrap();
    let blocks = body_blocks(&pages[0]);
    let boxed = block(&blocks[0]);
    assert_eq!(boxed.positioning, Positioning::Absolute);
    assert_eq!((boxed.x, boxed.y), (6_000, 5_000));
    assert_eq!((boxed.width, boxed.height), (10_000, 10_000));
    assert_eq!(line_text(lines(&boxed.children)[0]), "boxed");
    assert_eq!(block(&blocks[1]).y, 0);
}

#[test]
fn fixed_height_container_clips_hidden_overflow() {
    let tree = document(single_master(50_000, 50_000), seq(), |b| {
        b.start(FoKind::BlockContainer(ContainerTraits {
            height: Some(10_000),
            overflow: Overflow::Hidden,
            ..ContainerTraits::default()
        }))
        .unwrap();
        para(b, "one");
        para(b, "two");
        b.end().unwrap();
        para(b, "after");
    });
    let (engine, seen) = recording_engine(LayoutConfig::default());
    let pages = engine.layout(&tree).unwrap();
    let blocks = body_blocks(&pages[0]);
    let container = block(&blocks[0]);
    assert!(container.clipped);
    assert_eq!(container.height, 10_000);
    assert_eq!(block(&blocks[1]).y, 10_000);
    assert!(seen
        .lock()
        .unwrap()
        .contains(&LayoutDiagnostic::AbsoluteOverflow {
            page: 1,
            excess: 2 * 14_400 - 10_000,
        }));
}

#[test]
fn external_graphic_sets_line_height() {
    let tree = document(single_master(50_000, 100_000), seq(), |b| {
        b.start(FoKind::Block(BlockTraits::default())).unwrap();
        b.leaf(FoKind::ExternalGraphic(GraphicTraits {
            src: "logo.png".to_string(),
            width: 20_000,
            height: 30_000,
        }))
        .unwrap();
        b.end().unwrap();
    });
    let pages = engine().layout(&tree).unwrap();
    let lines = lines(body_blocks(&pages[0]));
    assert_eq!(lines[0].height, 30_000);
    match &lines[0].children[0] {
        InlineArea::Viewport(v) => {
            assert_eq!(v.src, "logo.png");
            assert_eq!(v.width, 20_000);
        }
        other => panic!("expected a viewport, got {other:?}"),
    }
}
