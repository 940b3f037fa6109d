#![no_main]
use lf_core::{EstimatorCfg, LineEstimator, POSITION_LIMIT};
use lf_traits::{SAMPLE_MAX, SensorFrame};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|input: ([u16; 8], [u16; 8], u16)| {
    let (a, b, threshold) = input;
    let mut est = LineEstimator::new(EstimatorCfg {
        edge_diff_threshold: threshold % (SAMPLE_MAX + 1),
        ..EstimatorCfg::default()
    });
    let mut prev = est.last_known();
    for raw in [a, b] {
        let frame = SensorFrame::new(raw.map(|v| v % (SAMPLE_MAX + 1)));
        let e = est.estimate(&frame);
        assert!(e.position.abs() <= POSITION_LIMIT);
        if e.source.is_held() {
            assert_eq!(e.position, prev);
        }
        prev = e.position;
    }
});
