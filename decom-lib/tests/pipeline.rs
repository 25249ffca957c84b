mod common;

use std::sync::Arc;

use common::frames;
use decom::{
    compose, get_stream_processor, Collector, Component, DataUnit, DecomOpts, Decommutator,
    Driver, Error, FrameSource, IterSource, Measurand, MeasurandExtractor, StreamProcessor,
    UnitKind, Value,
};

const SYNC: [u8; 3] = [0xfa, 0xf3, 0x20];

#[test]
fn decommutate_preserves_frames() {
    let input = frames(&[0, 1, 2, 4, 5, 8, 9, 10], &SYNC, 16);
    let units: Vec<DataUnit> = input.iter().cloned().map(DataUnit::from).collect();
    let source = StreamProcessor::new(IterSource::new(units, UnitKind::Frame).with_batch(3));
    let opts = DecomOpts::new(4).with_sync(&SYNC);
    let (collector, collected) = Collector::new(UnitKind::SubFrame);

    let pipeline = source
        .then(&StreamProcessor::new(Decommutator::new(opts)))
        .unwrap()
        .then(&StreamProcessor::new(collector))
        .unwrap();
    let passes = Driver::new(pipeline).run().unwrap();
    assert_eq!(passes, 3);

    let collected = collected.lock().unwrap();
    assert_eq!(collected.len(), input.len());
    let mut ids = Vec::default();
    for (unit, frame) in collected.iter().zip(&input) {
        let DataUnit::SubFrame(sf) = unit else {
            panic!("expected subframe, got {unit}");
        };
        assert_eq!(&sf.frame, frame);
        ids.push(sf.subframe_id);
    }
    assert_eq!(ids, vec![0, 1, 2, 0, 1, 0, 1, 2]);
}

#[test]
fn measurements_from_generated_frames() {
    let source = FrameSource::builder().frame_size(6).num_frames(4).build();
    let extract = MeasurandExtractor::new(vec![
        Measurand::new("counter", vec![Component::new(0).with_size(16)]),
        Measurand::new("odd", vec![Component::new(2).with_mask(0x01)]).with_subframe(1),
    ]);
    let (collector, collected) = Collector::new(UnitKind::Measurement);

    let pipeline = compose(
        &compose(
            &StreamProcessor::new(source),
            &StreamProcessor::new(Decommutator::new(DecomOpts::new(2))),
        )
        .unwrap(),
        &compose(
            &StreamProcessor::new(extract),
            &StreamProcessor::new(collector),
        )
        .unwrap(),
    )
    .unwrap();
    assert_eq!(pipeline.stages().unwrap().len(), 4);
    Driver::new(pipeline).run().unwrap();

    let collected = collected.lock().unwrap();
    let names: Vec<(u32, String)> = collected
        .iter()
        .map(|u| match u {
            DataUnit::Measurement(m) => (m.sequence, m.name.clone()),
            other => panic!("expected measurement, got {other}"),
        })
        .collect();
    assert_eq!(
        names,
        vec![
            (0, "counter".to_string()),
            (1, "counter".to_string()),
            (1, "odd".to_string()),
            (2, "counter".to_string()),
            (3, "counter".to_string()),
            (3, "odd".to_string()),
        ]
    );
    let DataUnit::Measurement(ref first) = collected[0] else {
        unreachable!()
    };
    assert_eq!(first.value, Value::Unsigned(0x0101));
}

#[test]
fn extraction_failure_aborts_unless_best_effort() {
    let measurands = vec![
        Measurand::new("beyond", vec![Component::new(10)]),
        Measurand::new("first", vec![Component::new(0)]),
    ];
    let input: Vec<DataUnit> = frames(&[0, 1], &SYNC, 4)
        .into_iter()
        .map(|f| decom::SubFrame::new(f, 0).into())
        .collect();

    let strict = StreamProcessor::new(MeasurandExtractor::new(measurands.clone()));
    strict.add_all(input.clone()).unwrap();
    let zult = strict.process();
    assert!(
        matches!(zult, Err(Error::NotEnoughData { .. })),
        "got {zult:?}"
    );

    let (collector, collected) = Collector::new(UnitKind::Measurement);
    let lenient = StreamProcessor::new(MeasurandExtractor::new(measurands).with_best_effort(true))
        .then(&StreamProcessor::new(collector))
        .unwrap();
    lenient.add_all(input).unwrap();
    lenient.process().unwrap();
    assert_eq!(collected.lock().unwrap().len(), 2);
}

#[test]
fn frame_output_cannot_feed_subframe_input() {
    let source = StreamProcessor::new(FrameSource::builder().frame_size(4).num_frames(1).build());
    let extract = StreamProcessor::new(MeasurandExtractor::new(vec![]));

    let zult = source.bind_output_to(&extract);
    assert!(
        matches!(
            zult,
            Err(Error::TypeMismatch {
                expected: UnitKind::SubFrame,
                actual: UnitKind::Frame
            })
        ),
        "got {zult:?}"
    );
}

#[test]
fn registry_does_not_keep_nodes_alive() {
    let node = StreamProcessor::named("pipeline decom", Decommutator::default()).unwrap();
    let found = get_stream_processor("pipeline_decom").expect("registered node");
    assert!(Arc::ptr_eq(&node, &found));
    assert_eq!(found.input_kind(), UnitKind::Frame);

    drop(found);
    drop(node);
    assert!(get_stream_processor("pipeline_decom").is_none());
}
