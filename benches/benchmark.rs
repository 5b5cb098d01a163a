use criterion::{
    criterion_group, criterion_main, AxisScale, BenchmarkId, Criterion, PlotConfiguration,
};
use rand::{thread_rng, Rng};

use mdevents::prelude::*;

fn description(n: usize) -> WorkspaceDescription {
    let names: Vec<String> = (0..n).map(|d| format!("d{d}")).collect();
    WorkspaceDescription::from_parallel(
        &names,
        &names,
        &names,
        &vec![0.0; n],
        &vec![100.0; n],
        &[],
    )
    .unwrap()
}

fn random_events<const N: usize>(i: usize) -> Vec<MDEvent<N>> {
    let mut rng = thread_rng();

    (0..i)
        .map(|id| {
            let center = std::array::from_fn(|_| rng.gen_range(0.0..100.0));
            let signal = rng.gen_range(0.1..10.0);

            MDEvent::new(signal, signal, 0, id as u32, center)
        })
        .collect()
}

fn filled<const N: usize>(events: &[MDEvent<N>], bc: &BoxController) -> MDEventWorkspace<N> {
    let mut ws = MDEventWorkspace::<N>::new(&description(N)).unwrap();
    ws.set_box_controller(bc.clone()).unwrap();
    ws.add_events(events.iter().copied());
    ws
}

fn bench_dimension<const N: usize>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("MDEventWorkspace<{N}>"));
    group
        .plot_config(PlotConfiguration::default().summary_scale(AxisScale::Logarithmic))
        .warm_up_time(std::time::Duration::from_secs(1))
        .sample_size(20);

    let bc = BoxController::default().with_split_threshold(200);

    for i in (10..=18).step_by(2).map(|i| 2_usize.pow(i)) {
        let events = random_events::<N>(i);

        group.bench_with_input(BenchmarkId::new("add_events", i), &events, |b, input| {
            b.iter(|| filled(input, &bc).num_boxes())
        });

        let mut ws = filled(&events, &bc);
        group.bench_with_input(BenchmarkId::new("refresh_centroid", i), &i, |b, _| {
            b.iter(|| ws.refresh_centroid())
        });

        let coordinates: Vec<f32> = events.iter().flat_map(|e| *e.center()).collect();
        let signal_error: Vec<f32> = events
            .iter()
            .flat_map(|e| [e.signal(), e.error_squared()])
            .collect();
        let run_index = vec![0; i];
        let detector_id: Vec<u32> = (0..i as u32).collect();
        let buffers = EventBuffers::new(&signal_error, &run_index, &detector_id, &coordinates, i);

        group.bench_with_input(BenchmarkId::new("wrapper::add_events", i), &buffers, |b, input| {
            b.iter(|| {
                let mut wrapper = WorkspaceWrapper::new();
                wrapper.create_empty_workspace(&description(N)).unwrap();
                wrapper.set_box_controller(bc.clone()).unwrap();
                wrapper.add_events(input).unwrap()
            })
        });
    }

    group.finish();
}

fn criterion_benchmark(c: &mut Criterion) {
    bench_dimension::<3>(c);
    bench_dimension::<4>(c);
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
