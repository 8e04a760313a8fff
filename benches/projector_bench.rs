use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array2;
use rayon::prelude::*;

use rasterproj::proj::crs::{CrsTransform, ReferenceSystem};
use rasterproj::proj::datum::NO_DATUM_TRANSFORM;
use rasterproj::projector::ApproximationGrid;
use rasterproj::provider::MemoryRaster;
use rasterproj::{Extent, GridOptions, Precision, RasterGeometry, RasterProjector};

// Geographic source covering southern Sweden, reprojected into UTM 33N
fn make_projector(size: usize, precision: Precision) -> RasterProjector {
    let mut src = Array2::zeros((size, size));
    for row in 0..size {
        for col in 0..size {
            src[(row, col)] = (row * size + col) as f64;
        }
    }
    let raster = MemoryRaster::new(vec![src], Extent::new(12.0, 55.0, 18.0, 60.0), None).unwrap();

    let mut projector = RasterProjector::new();
    projector.set_crs(
        ReferenceSystem::new("EPSG:4326"),
        ReferenceSystem::new("EPSG:32633"),
        NO_DATUM_TRANSFORM,
        NO_DATUM_TRANSFORM,
    );
    projector.set_precision(precision);
    projector.set_input(Arc::new(raster));
    projector
}

fn dest_window() -> Extent {
    Extent::new(400_000.0, 6_200_000.0, 600_000.0, 6_500_000.0)
}

fn bench_block_approximate(c: &mut Criterion) {
    for &size in &[256, 512, 1024] {
        let projector = make_projector(size, Precision::Approximate);
        c.bench_function(&format!("block_approximate_{size}x{size}"), |b| {
            b.iter(|| black_box(projector.block(1, &dest_window(), size, size, None).unwrap()));
        });
    }
}

fn bench_block_exact(c: &mut Criterion) {
    for &size in &[256, 512, 1024] {
        let projector = make_projector(size, Precision::Exact);
        c.bench_function(&format!("block_exact_{size}x{size}"), |b| {
            b.iter(|| black_box(projector.block(1, &dest_window(), size, size, None).unwrap()));
        });
    }
}

fn bench_grid_construction(c: &mut Criterion) {
    let raster = MemoryRaster::new(
        vec![Array2::zeros((512, 512))],
        Extent::new(12.0, 55.0, 18.0, 60.0),
        None,
    )
    .unwrap();
    let ct = CrsTransform::new(
        &ReferenceSystem::new("EPSG:4326"),
        &ReferenceSystem::new("EPSG:32633"),
    )
    .unwrap();
    let options = GridOptions::default();

    for &size in &[256, 1024, 4096] {
        let dest = RasterGeometry::new(dest_window(), size, size);
        c.bench_function(&format!("grid_construction_{size}"), |b| {
            b.iter(|| {
                black_box(ApproximationGrid::new(
                    dest,
                    &raster,
                    &ct,
                    Precision::Approximate,
                    &options,
                ))
            });
        });
    }
}

fn bench_multi_band(c: &mut Criterion) {
    let size = 512;
    let bands = (0..4).map(|b| Array2::from_elem((size, size), b as f64)).collect();
    let raster = MemoryRaster::new(bands, Extent::new(12.0, 55.0, 18.0, 60.0), None).unwrap();
    let mut projector = make_projector(size, Precision::Approximate);
    projector.set_input(Arc::new(raster));

    c.bench_function("blocks_4_bands_512", |b| {
        b.iter(|| black_box(projector.blocks(&[1, 2, 3, 4], &dest_window(), size, size, None).unwrap()));
    });

    // one projector clone per worker, bands read in parallel by the caller
    let workers: Vec<RasterProjector> = (0..4).map(|_| projector.clone()).collect();
    c.bench_function("blocks_4_bands_512_parallel_clones", |b| {
        b.iter(|| {
            let out: Vec<_> = workers
                .par_iter()
                .enumerate()
                .map(|(i, p)| p.block(i + 1, &dest_window(), size, size, None).unwrap())
                .collect();
            black_box(out)
        });
    });
}

criterion_group!(
    benches,
    bench_block_approximate,
    bench_block_exact,
    bench_grid_construction,
    bench_multi_band,
);
criterion_main!(benches);
