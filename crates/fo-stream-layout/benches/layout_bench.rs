use std::alloc::{GlobalAlloc, Layout, System};
use std::hint::black_box;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use fo_stream::{
    BlockTraits, CellTraits, ColumnWidth, FoKind, FoTree, FoTreeBuilder, LayoutMasterSet,
    ListTraits, PageSequenceTraits, SimplePageMaster, TableTraits, TextAlign, TextTraits,
};
use fo_stream_layout::{LayoutConfig, LayoutEngine};

const WORDS: &[&str] = &[
    "the", "quick", "brown", "fox", "jumps", "over", "a", "lazy", "dog", "while", "typesetting",
    "engines", "measure", "every", "glyph", "and", "break", "paragraphs", "into", "lines",
];

struct TrackingAllocator;

static CURRENT_ALLOC_BYTES: AtomicUsize = AtomicUsize::new(0);
static PEAK_ALLOC_BYTES: AtomicUsize = AtomicUsize::new(0);

#[global_allocator]
static GLOBAL_ALLOCATOR: TrackingAllocator = TrackingAllocator;

fn current_alloc_bytes() -> usize {
    CURRENT_ALLOC_BYTES.load(Ordering::Relaxed)
}

fn peak_alloc_bytes() -> usize {
    PEAK_ALLOC_BYTES.load(Ordering::Relaxed)
}

fn reset_peak_alloc_bytes() {
    PEAK_ALLOC_BYTES.store(current_alloc_bytes(), Ordering::Relaxed);
}

fn add_current_alloc_bytes(delta: usize) {
    let current = CURRENT_ALLOC_BYTES.fetch_add(delta, Ordering::Relaxed) + delta;
    PEAK_ALLOC_BYTES.fetch_max(current, Ordering::Relaxed);
}

fn sub_current_alloc_bytes(delta: usize) {
    let _ = CURRENT_ALLOC_BYTES.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        Some(current.saturating_sub(delta))
    });
}

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            add_current_alloc_bytes(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        sub_current_alloc_bytes(layout.size());
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            add_current_alloc_bytes(layout.size());
        }
        ptr
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            if new_size >= layout.size() {
                add_current_alloc_bytes(new_size - layout.size());
            } else {
                sub_current_alloc_bytes(layout.size() - new_size);
            }
        }
        new_ptr
    }
}

#[derive(Clone, Debug)]
struct CaseResult {
    fixture: String,
    case: String,
    iterations: usize,
    min_ns: u128,
    median_ns: u128,
    mean_ns: u128,
    max_ns: u128,
    min_peak_heap_bytes: usize,
    median_peak_heap_bytes: usize,
    mean_peak_heap_bytes: usize,
    max_peak_heap_bytes: usize,
}

fn percentile_u128(sorted: &[u128], percentile: f64) -> u128 {
    let idx = ((sorted.len().saturating_sub(1) as f64) * percentile).round() as usize;
    sorted[idx]
}

fn percentile_usize(sorted: &[usize], percentile: f64) -> usize {
    let idx = ((sorted.len().saturating_sub(1) as f64) * percentile).round() as usize;
    sorted[idx]
}

fn sentence(seed: usize, len: usize) -> String {
    (0..len)
        .map(|i| WORDS[(seed * 7 + i * 3) % WORDS.len()])
        .collect::<Vec<_>>()
        .join(" ")
}

fn a4_document<F>(build: F) -> FoTree
where
    F: FnOnce(&mut FoTreeBuilder),
{
    let mut masters = LayoutMasterSet::new();
    masters
        .add_simple(SimplePageMaster::a4("a4"))
        .unwrap_or_else(|e| panic!("master: {}", e));
    let mut b = FoTreeBuilder::new(masters);
    b.start(FoKind::PageSequence(PageSequenceTraits::new("a4")))
        .unwrap_or_else(|e| panic!("sequence: {}", e));
    b.start(FoKind::Flow {
        flow_name: "xsl-region-body".to_string(),
    })
    .unwrap_or_else(|e| panic!("flow: {}", e));
    build(&mut b);
    b.end().unwrap_or_else(|e| panic!("end flow: {}", e));
    b.end().unwrap_or_else(|e| panic!("end sequence: {}", e));
    b.finish().unwrap_or_else(|e| panic!("finish: {}", e))
}

fn paragraphs(count: usize, align: TextAlign) -> FoTree {
    a4_document(|b| {
        for n in 0..count {
            b.start(FoKind::Block(BlockTraits {
                text_align: align,
                ..BlockTraits::default()
            }))
            .unwrap_or_else(|e| panic!("block: {}", e));
            b.text(&sentence(n, 60), &TextTraits::default())
                .unwrap_or_else(|e| panic!("text: {}", e));
            b.end().unwrap_or_else(|e| panic!("end block: {}", e));
        }
    })
}

fn table(rows: usize) -> FoTree {
    a4_document(|b| {
        b.start(FoKind::Table(TableTraits {
            columns: vec![
                ColumnWidth::Fixed(40_000),
                ColumnWidth::Proportional(1),
                ColumnWidth::Proportional(2),
            ],
            ..TableTraits::default()
        }))
        .unwrap_or_else(|e| panic!("table: {}", e));
        for n in 0..rows {
            b.start(FoKind::TableRow)
                .unwrap_or_else(|e| panic!("row: {}", e));
            for (cell, len) in [2usize, 8, 20].into_iter().enumerate() {
                b.start(FoKind::TableCell(CellTraits::default()))
                    .unwrap_or_else(|e| panic!("cell: {}", e));
                b.start(FoKind::Block(BlockTraits::default()))
                    .unwrap_or_else(|e| panic!("block: {}", e));
                b.text(&sentence(n + cell, len), &TextTraits::default())
                    .unwrap_or_else(|e| panic!("text: {}", e));
                b.end().unwrap_or_else(|e| panic!("end block: {}", e));
                b.end().unwrap_or_else(|e| panic!("end cell: {}", e));
            }
            b.end().unwrap_or_else(|e| panic!("end row: {}", e));
        }
        b.end().unwrap_or_else(|e| panic!("end table: {}", e));
    })
}

fn list(items: usize) -> FoTree {
    a4_document(|b| {
        b.start(FoKind::ListBlock(ListTraits::default()))
            .unwrap_or_else(|e| panic!("list: {}", e));
        for n in 0..items {
            b.start(FoKind::ListItem(BlockTraits::default()))
                .unwrap_or_else(|e| panic!("item: {}", e));
            for (part, text) in [
                (FoKind::ListItemLabel, format!("{}.", n + 1)),
                (FoKind::ListItemBody, sentence(n, 25)),
            ] {
                b.start(part).unwrap_or_else(|e| panic!("part: {}", e));
                b.start(FoKind::Block(BlockTraits::default()))
                    .unwrap_or_else(|e| panic!("block: {}", e));
                b.text(&text, &TextTraits::default())
                    .unwrap_or_else(|e| panic!("text: {}", e));
                b.end().unwrap_or_else(|e| panic!("end block: {}", e));
                b.end().unwrap_or_else(|e| panic!("end part: {}", e));
            }
            b.end().unwrap_or_else(|e| panic!("end item: {}", e));
        }
        b.end().unwrap_or_else(|e| panic!("end list: {}", e));
    })
}

fn run_case<F>(
    fixture: &str,
    case: &str,
    warmup_iters: usize,
    measure_iters: usize,
    mut op: F,
) -> CaseResult
where
    F: FnMut() -> usize,
{
    for _ in 0..warmup_iters {
        black_box(op());
    }

    let mut time_samples = Vec::with_capacity(measure_iters);
    let mut mem_samples = Vec::with_capacity(measure_iters);
    for _ in 0..measure_iters {
        let baseline_alloc = current_alloc_bytes();
        reset_peak_alloc_bytes();
        let start = Instant::now();
        black_box(op());
        time_samples.push(start.elapsed().as_nanos());
        mem_samples.push(peak_alloc_bytes().saturating_sub(baseline_alloc));
    }

    time_samples.sort_unstable();
    mem_samples.sort_unstable();

    let time_sum: u128 = time_samples.iter().copied().sum();
    let mem_sum: usize = mem_samples.iter().copied().sum();

    CaseResult {
        fixture: fixture.to_string(),
        case: case.to_string(),
        iterations: measure_iters,
        min_ns: time_samples[0],
        median_ns: percentile_u128(&time_samples, 0.5),
        mean_ns: time_sum / time_samples.len() as u128,
        max_ns: time_samples[time_samples.len() - 1],
        min_peak_heap_bytes: mem_samples[0],
        median_peak_heap_bytes: percentile_usize(&mem_samples, 0.5),
        mean_peak_heap_bytes: mem_sum / mem_samples.len(),
        max_peak_heap_bytes: mem_samples[mem_samples.len() - 1],
    }
}

fn main() {
    let quick = std::env::args().any(|arg| arg == "--quick");
    let warmup_iters = if quick { 1 } else { 2 };
    let measure_iters = if quick { 3 } else { 10 };

    println!("# fo-stream layout benchmark");
    println!(
        "# mode={} warmup_iters={} measure_iters={}",
        if quick { "quick" } else { "full" },
        warmup_iters,
        measure_iters
    );
    println!(
        "fixture,case,iterations,min_ns,median_ns,mean_ns,max_ns,min_peak_heap_bytes,median_peak_heap_bytes,mean_peak_heap_bytes,max_peak_heap_bytes"
    );

    let fixtures: Vec<(&str, Arc<FoTree>)> = vec![
        ("prose-500", Arc::new(paragraphs(500, TextAlign::Start))),
        ("justified-500", Arc::new(paragraphs(500, TextAlign::Justify))),
        ("table-300", Arc::new(table(300))),
        ("list-400", Arc::new(list(400))),
    ];
    let engine = LayoutEngine::new(LayoutConfig::default());

    let mut results = Vec::new();
    for (fixture_key, tree) in &fixtures {
        results.push(run_case(
            fixture_key,
            "layout_collect",
            warmup_iters,
            measure_iters,
            || {
                engine
                    .layout(tree)
                    .unwrap_or_else(|e| panic!("layout failed: {}", e))
                    .len()
            },
        ));

        results.push(run_case(
            fixture_key,
            "layout_drop_pages",
            warmup_iters,
            measure_iters,
            || {
                let summary = engine
                    .layout_with(tree, |page| {
                        black_box(page.regions.len());
                    })
                    .unwrap_or_else(|e| panic!("layout failed: {}", e));
                summary.page_count
            },
        ));

        results.push(run_case(
            fixture_key,
            "stream_first_page",
            warmup_iters,
            measure_iters,
            || {
                let mut stream = engine.layout_streaming(Arc::clone(tree));
                stream
                    .next()
                    .and_then(Result::ok)
                    .map(|page| page.text().len())
                    .unwrap_or(0)
            },
        ));
    }

    for result in &results {
        println!(
            "{},{},{},{},{},{},{},{},{},{},{}",
            result.fixture,
            result.case,
            result.iterations,
            result.min_ns,
            result.median_ns,
            result.mean_ns,
            result.max_ns,
            result.min_peak_heap_bytes,
            result.median_peak_heap_bytes,
            result.mean_peak_heap_bytes,
            result.max_peak_heap_bytes
        );
    }
}
