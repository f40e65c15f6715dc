//! # Stage Benchmark
//!
//! Cost of one period of each stage, the lower bound on how short task periods can be.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ctrl_lib::{
    controller::{self, Controller},
    data_store::{Axis, DataStore, Gains},
    linearizer::{self, Linearizer},
    plant::{self, Plant},
    ref_gen::{self, RefGen},
    ref_model::{self, RefModel},
    telemetry::SimLogger,
};
use nalgebra::{Vector2, Vector3};
use util::module::State;

fn stages_benchmark(c: &mut Criterion) {
    // ---- Initialise stages with the default geometry ----

    let mut rg = RefGen::default();
    rg.init(ref_gen::Params {
        amplitude_m: 5.0 / std::f64::consts::PI,
        angular_freq_rads: 0.2 * std::f64::consts::PI,
        reversal_time_s: 10.0,
    })
    .unwrap();

    let mut rm = RefModel::new(Axis::X);
    rm.init(0.05).unwrap();

    let mut ctrl = Controller::default();
    ctrl.init(()).unwrap();

    let mut lin = Linearizer::default();
    lin.init(0.3).unwrap();

    let mut plant = Plant::default();
    plant
        .init(plant::Params {
            step_s: 0.01,
            offset_m: 0.3,
        })
        .unwrap();

    let ds = DataStore::new(Vector3::new(0.1, -0.2, 0.7), Gains::new(3.0, 3.0), 0.3);

    // ---- Bench each stage ----

    let rg_input = ref_gen::InputData { sim_time_s: 12.3 };
    c.bench_function("RefGen::proc", |b| {
        b.iter(|| rg.proc(black_box(&rg_input)).unwrap())
    });

    let rm_input = ref_model::InputData {
        reference: 1.2,
        ym: 0.4,
        alpha: 3.0,
    };
    c.bench_function("RefModel::proc", |b| {
        b.iter(|| rm.proc(black_box(&rm_input)).unwrap())
    });

    let ctrl_input = controller::InputData {
        output: Vector2::new(0.3, 0.0),
        ym: Vector2::new(0.5, 0.1),
        ym_dot: Vector2::new(0.2, 0.6),
        gains: Gains::new(3.0, 3.0),
    };
    c.bench_function("Controller::proc", |b| {
        b.iter(|| ctrl.proc(black_box(&ctrl_input)).unwrap())
    });

    let lin_input = linearizer::InputData {
        heading_rad: 0.7,
        lin_input: Vector2::new(0.9, -0.4),
    };
    c.bench_function("Linearizer::proc", |b| {
        b.iter(|| lin.proc(black_box(&lin_input)).unwrap())
    });

    let plant_input = plant::InputData {
        state: Vector3::new(0.1, -0.2, 0.7),
        plant_input: Vector2::new(0.5, 0.2),
    };
    c.bench_function("Plant::proc", |b| {
        b.iter(|| plant.proc(black_box(&plant_input)).unwrap())
    });

    c.bench_function("SimLogger::sample", |b| {
        b.iter(|| SimLogger::sample(black_box(&ds)))
    });
}

criterion_group!(benches, stages_benchmark);
criterion_main!(benches);
