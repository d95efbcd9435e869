//! Benchmarks for the image transformations and the work-item codec.
//!
//! Run with: cargo bench -p darkroom-core

use std::io::Cursor;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use darkroom_core::config::{LimitsConfig, TransformConfig};
use darkroom_core::queue::WorkItem;
use darkroom_core::transform::{ImageTransformer, Transformer};
use darkroom_core::{TaskId, TaskType};
use image::{DynamicImage, ImageFormat, RgbImage};

fn source_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn benchmark_transforms(c: &mut Criterion) {
    let input = source_png(1920, 1080);
    let transformer = ImageTransformer::new(TransformConfig::default(), &LimitsConfig::default());

    for task_type in TaskType::ALL {
        c.bench_function(&format!("transform_{}_1080p", task_type), |b| {
            b.iter(|| {
                let _ = transformer.transform(black_box(&input), task_type);
            })
        });
    }
}

fn benchmark_work_item(c: &mut Criterion) {
    let payload = WorkItem {
        task_id: TaskId::new(42),
    }
    .encode()
    .unwrap();

    c.bench_function("work_item_decode", |b| {
        b.iter(|| {
            let _ = WorkItem::decode(black_box(&payload));
        })
    });
}

criterion_group!(benches, benchmark_transforms, benchmark_work_item);
criterion_main!(benches);
